// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Authenticated session: cookie-jar persistence and the login form.

use crate::config::HarvestConfig;
use crate::driver::{PageDriver, SessionCookie};
use crate::error::HarvestError;
use crate::output::write_file;
use crate::wait::{wait_for, Readiness};
use anyhow::{Context, Result};
use std::path::Path;
use url::Url;

/// Portal login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// `HARVEST_USERNAME` and `HARVEST_PASSWORD`, when both are set.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("HARVEST_USERNAME").ok()?;
        let password = std::env::var("HARVEST_PASSWORD").ok()?;
        Some(Self { username, password })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Read a cookie jar from disk.
pub fn read_cookie_jar(path: &Path) -> Result<Vec<SessionCookie>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cookies = serde_json::from_str(&raw).map_err(HarvestError::from)?;
    Ok(cookies)
}

pub struct SessionManager<'a> {
    config: &'a HarvestConfig,
}

impl<'a> SessionManager<'a> {
    pub fn new(config: &'a HarvestConfig) -> Self {
        Self { config }
    }

    /// Load the saved cookie jar into the browser. A missing or unreadable
    /// jar is not an error; the run re-authenticates instead.
    pub async fn restore(&self, driver: &mut dyn PageDriver) -> usize {
        let path = &self.config.cookie_file;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no saved session");
            return 0;
        }
        let cookies = match read_cookie_jar(path) {
            Ok(cookies) => cookies,
            Err(e) => {
                tracing::warn!("ignoring saved session: {e:#}");
                return 0;
            }
        };
        match driver.set_cookies(&cookies).await {
            Ok(()) => {
                tracing::info!(count = cookies.len(), "restored saved session");
                cookies.len()
            }
            Err(e) => {
                tracing::warn!("could not restore saved session: {e:#}");
                0
            }
        }
    }

    /// Write the browser's cookies to the jar, replacing it.
    pub async fn persist(&self, driver: &dyn PageDriver) -> Result<()> {
        let cookies = driver.cookies().await?;
        let json = serde_json::to_string_pretty(&cookies).map_err(HarvestError::from)?;
        write_file(&self.config.cookie_file, json).await?;
        tracing::debug!(path = %self.config.cookie_file.display(), "saved session");
        Ok(())
    }

    /// Open the portal home and check whether it offers a login link.
    pub async fn needs_login(&self, driver: &mut dyn PageDriver) -> Result<bool> {
        driver.navigate(&self.config.base_url).await?;
        driver.exists(&self.config.selectors.login_link).await
    }

    /// Submit the login form. Any failure here is fatal to the run.
    #[tracing::instrument(skip_all, fields(user = %credentials.username))]
    pub async fn login(&self, driver: &mut dyn PageDriver, credentials: &Credentials) -> Result<()> {
        let selectors = &self.config.selectors;
        let policy = &self.config.timing.login;

        if let Some(link) = driver.query_selector(&selectors.login_link).await? {
            match link.attr("href") {
                Some(href) => {
                    let current = driver.current_url().await?;
                    let target = Url::parse(&current)
                        .and_then(|base| base.join(href))
                        .map(String::from)
                        .unwrap_or_else(|_| href.to_string());
                    driver.navigate(&target).await?;
                }
                None => driver.click(&link.handle).await?,
            }
        }

        let login_page = driver.current_url().await?;
        if !wait_for(driver, Readiness::Present(&selectors.username_field), policy).await? {
            return Err(HarvestError::LoginFormMissing(login_page).into());
        }
        let (Some(user), Some(pass), Some(submit)) = (
            driver.query_selector(&selectors.username_field).await?,
            driver.query_selector(&selectors.password_field).await?,
            driver.query_selector(&selectors.login_submit).await?,
        ) else {
            return Err(HarvestError::LoginFormMissing(login_page).into());
        };

        driver.set_value(&user.handle, &credentials.username).await?;
        driver.set_value(&pass.handle, &credentials.password).await?;
        driver.click(&submit.handle).await?;

        let form = [selectors.password_field.clone()];
        let left_form = wait_for(driver, Readiness::Absent(&form), policy).await?;
        if !left_form || driver.exists(&selectors.login_link).await? {
            return Err(HarvestError::AuthenticationFailed(format!(
                "still on the login page as {}",
                credentials.username
            ))
            .into());
        }
        tracing::info!("logged in");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timing;
    use crate::driver::memory::{ClickEffect, MemoryDriver};

    const HOME: &str = "https://portal.example";
    const LOGIN: &str = "https://portal.example/login/index.php";
    const DASHBOARD: &str = "https://portal.example/my/";

    fn config(dir: &Path) -> HarvestConfig {
        HarvestConfig {
            base_url: HOME.to_string(),
            cookie_file: dir.join("cookies.json"),
            timing: Timing::instant(),
            ..Default::default()
        }
    }

    fn portal() -> MemoryDriver {
        let mut driver = MemoryDriver::new();
        driver.add_page(HOME, r#"<a href="/login/index.php">Log in</a>"#);
        driver.add_page(
            LOGIN,
            r#"<form><input id="username"><input id="password" type="password">
               <button class="btn-submit">Log in</button></form>"#,
        );
        driver.add_page(DASHBOARD, r#"<a href="/course/view.php?id=1">Course</a>"#);
        driver
    }

    fn creds() -> Credentials {
        Credentials {
            username: "student".into(),
            password: "hunter2".into(),
        }
    }

    #[tokio::test]
    async fn successful_login() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut driver = portal();
        driver.on_click(LOGIN, ".btn-submit", ClickEffect::Navigate(DASHBOARD.into()));

        let session = SessionManager::new(&config);
        assert!(session.needs_login(&mut driver).await.unwrap());
        session.login(&mut driver, &creds()).await.unwrap();
        assert_eq!(driver.current_url().await.unwrap(), DASHBOARD);
    }

    #[tokio::test]
    async fn rejected_credentials_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut driver = portal();

        let session = SessionManager::new(&config);
        session.needs_login(&mut driver).await.unwrap();
        let err = session.login(&mut driver, &creds()).await.unwrap_err();
        let classified = err.downcast_ref::<HarvestError>().unwrap();
        assert!(matches!(classified, HarvestError::AuthenticationFailed(_)));
        assert!(classified.is_fatal());
    }

    #[tokio::test]
    async fn missing_form_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut driver = portal();
        driver.add_page(LOGIN, "<p>Maintenance</p>");

        let session = SessionManager::new(&config);
        session.needs_login(&mut driver).await.unwrap();
        let err = session.login(&mut driver, &creds()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarvestError>(),
            Some(HarvestError::LoginFormMissing(_))
        ));
    }

    #[tokio::test]
    async fn cookie_jar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let session = SessionManager::new(&config);

        let mut first = MemoryDriver::new();
        first
            .set_cookies(&[SessionCookie {
                name: "MoodleSession".into(),
                value: "abc".into(),
                domain: "portal.example".into(),
                path: "/".into(),
                expires: None,
                http_only: true,
                secure: true,
            }])
            .await
            .unwrap();
        session.persist(&first).await.unwrap();

        let mut second = MemoryDriver::new();
        assert_eq!(session.restore(&mut second).await, 1);
        assert_eq!(second.cookies().await.unwrap(), first.cookies().await.unwrap());
    }

    #[tokio::test]
    async fn unreadable_jar_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.cookie_file, "not json").unwrap();

        let mut driver = MemoryDriver::new();
        assert_eq!(SessionManager::new(&config).restore(&mut driver).await, 0);
        assert!(driver.cookies().await.unwrap().is_empty());
    }

    #[test]
    fn password_is_not_logged() {
        let shown = format!("{:?}", creds());
        assert!(shown.contains("student"));
        assert!(!shown.contains("hunter2"));
    }
}
