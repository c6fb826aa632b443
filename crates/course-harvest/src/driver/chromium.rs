// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based page driver using chromiumoxide.

use super::{
    Download, DownloadTrigger, ElementRef, ElementSnapshot, NavigationResult, PageDriver,
    ScreenshotTarget, SessionCookie,
};
use crate::config::HarvestConfig;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. HARVEST_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("HARVEST_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Shape returned by the snapshot script.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    text: String,
    inner_html: String,
    outer_html: String,
}

/// One Chromium tab driven over CDP.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    nav_timeout: Duration,
}

impl ChromiumDriver {
    /// Launch Chromium and open a blank tab.
    pub async fn launch(config: &HarvestConfig) -> Result<Self> {
        let chrome_path = config
            .chromium_path
            .clone()
            .or_else(find_chromium)
            .context("Chromium not found. Set `chromium_path` or HARVEST_CHROMIUM_PATH.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(1366, 900)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        builder = if config.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        let browser_config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        Ok(Self {
            browser,
            page,
            handler,
            nav_timeout: config.timing.navigation_timeout(),
        })
    }

    /// Close the browser and stop the event handler.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }

    async fn element(&self, element: &ElementRef) -> Result<Element> {
        let mut matches = self
            .page
            .find_elements(element.selector.as_str())
            .await
            .with_context(|| format!("failed to query {}", element.selector))?;
        if element.index >= matches.len() {
            bail!("{}[{}] not found", element.selector, element.index);
        }
        Ok(matches.swap_remove(element.index))
    }

    async fn enable_downloads(&self, dir: &Path) -> Result<()> {
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::AllowAndName)
            .download_path(dir.to_string_lossy().to_string())
            .events_enabled(true)
            .build()
            .map_err(|e| anyhow!("invalid download behavior: {e}"))?;
        self.browser
            .execute(params)
            .await
            .context("failed to enable downloads")?;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(self.nav_timeout, self.page.goto(url)).await;

        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());
                tracing::debug!(url, final_url = %final_url, elapsed_ms, "navigated");
                Ok(NavigationResult { final_url })
            }
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!(
                "navigation to {url} timed out after {}ms",
                self.nav_timeout.as_millis()
            ),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .unwrap_or_default();
        Ok(url)
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>> {
        let script = format!(
            r#"(() => Array.from(document.querySelectorAll({sel})).map(el => ({{
                tag: el.tagName.toLowerCase(),
                classes: Array.from(el.classList),
                attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),
                text: el.innerText ?? el.textContent ?? "",
                inner_html: el.innerHTML,
                outer_html: el.outerHTML
            }})))()"#,
            sel = super::js_string(selector)
        );
        let raw: Vec<RawSnapshot> = self
            .page
            .evaluate(script)
            .await
            .with_context(|| format!("failed to query {selector}"))?
            .into_value()
            .map_err(|e| anyhow!("failed to decode snapshot of {selector}: {e:?}"))?;

        Ok(raw
            .into_iter()
            .enumerate()
            .map(|(index, r)| ElementSnapshot {
                handle: ElementRef::new(selector, index),
                tag: r.tag,
                classes: r.classes,
                attributes: r.attributes,
                text: r.text,
                inner_html: r.inner_html,
                outer_html: r.outer_html,
            })
            .collect())
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn click(&mut self, element: &ElementRef) -> Result<()> {
        self.element(element)
            .await?
            .click()
            .await
            .with_context(|| format!("failed to click {}", element.selector))?;
        Ok(())
    }

    async fn screenshot(&mut self, target: &ScreenshotTarget, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match target {
            ScreenshotTarget::Element(element) => {
                self.element(element)
                    .await?
                    .save_screenshot(CaptureScreenshotFormat::Png, path)
                    .await
                    .with_context(|| format!("failed to capture {}", element.selector))?;
            }
            ScreenshotTarget::FullPage => {
                let params = ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build();
                self.page
                    .save_screenshot(params, path)
                    .await
                    .context("failed to capture page")?;
            }
        }
        Ok(())
    }

    async fn capture_download(
        &mut self,
        trigger: DownloadTrigger,
        staging_dir: &Path,
        timeout: Duration,
    ) -> Result<Option<Download>> {
        tokio::fs::create_dir_all(staging_dir).await?;
        let staging = tokio::fs::canonicalize(staging_dir).await?;
        self.enable_downloads(&staging).await?;

        let mut begins = self
            .browser
            .event_listener::<EventDownloadWillBegin>()
            .await?;
        let mut progress = self
            .browser
            .event_listener::<EventDownloadProgress>()
            .await?;

        match &trigger {
            DownloadTrigger::Navigate(url) => {
                // Chromium aborts the navigation once the response turns into a download.
                if let Err(e) = self.page.goto(url.as_str()).await {
                    tracing::debug!("navigation ended while downloading {url}: {e}");
                }
            }
            DownloadTrigger::Click(element) => self.click(element).await?,
        }

        let finished = tokio::time::timeout(timeout, async {
            let begin = begins.next().await?;
            while let Some(event) = progress.next().await {
                if event.guid != begin.guid {
                    continue;
                }
                match event.state {
                    DownloadProgressState::Completed => return Some(begin),
                    DownloadProgressState::Canceled => return None,
                    _ => {}
                }
            }
            None
        })
        .await;

        match finished {
            Ok(Some(begin)) => {
                let suggested = begin.suggested_filename.trim();
                Ok(Some(Download {
                    suggested_filename: (!suggested.is_empty()).then(|| suggested.to_string()),
                    path: staging.join(&begin.guid),
                }))
            }
            Ok(None) => Ok(None),
            Err(_) => {
                tracing::warn!(?trigger, "no download finished within {}ms", timeout.as_millis());
                Ok(None)
            }
        }
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .context("failed to read cookies")?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: Some(c.expires),
                http_only: c.http_only,
                secure: c.secure,
            })
            .collect())
    }

    async fn set_cookies(&mut self, cookies: &[SessionCookie]) -> Result<()> {
        let mut params = Vec::with_capacity(cookies.len());
        for c in cookies {
            let mut builder = CookieParam::builder()
                .name(c.name.clone())
                .value(c.value.clone())
                .domain(c.domain.clone())
                .path(c.path.clone())
                .secure(c.secure)
                .http_only(c.http_only);
            if let Some(expires) = c.expires.filter(|e| *e > 0.0) {
                builder = builder.expires(TimeSinceEpoch::new(expires));
            }
            params.push(
                builder
                    .build()
                    .map_err(|e| anyhow!("invalid cookie {}: {e}", c.name))?,
            );
        }
        self.page
            .set_cookies(params)
            .await
            .context("failed to set cookies")?;
        Ok(())
    }
}
