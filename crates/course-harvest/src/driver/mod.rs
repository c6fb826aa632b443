// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Page driver abstraction over a single browser tab.
//!
//! The pipeline only ever talks to [`PageDriver`]: one tab, one session,
//! exclusively borrowed by whichever step is running. Elements are returned as
//! driver-agnostic [`ElementSnapshot`]s and addressed back through
//! [`ElementRef`] (selector + match index), so nothing holds a live handle
//! across steps.

pub mod chromium;
pub mod memory;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
}

/// Addresses the `index`-th match of `selector` in the current document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    pub selector: String,
    pub index: usize,
}

impl ElementRef {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }

    /// JS expression evaluating to the element (or `undefined`).
    pub fn js_expr(&self) -> String {
        format!(
            "document.querySelectorAll({})[{}]",
            js_string(&self.selector),
            self.index
        )
    }
}

/// A normalized view of one element: tag, classes, attributes and content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub handle: ElementRef,
    /// Lower-case tag name.
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    /// Rendered text content.
    pub text: String,
    pub inner_html: String,
    pub outer_html: String,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// What a screenshot should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotTarget {
    Element(ElementRef),
    FullPage,
}

/// The action expected to start a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTrigger {
    /// Navigating to the URL. The navigation itself may fail once the
    /// download starts; drivers swallow that.
    Navigate(String),
    Click(ElementRef),
}

/// A completed download staged on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Filename proposed by the server, if any.
    pub suggested_filename: Option<String>,
    /// Where the driver staged the bytes.
    pub path: PathBuf,
}

impl Download {
    /// Move the staged file to `dest`, creating parent directories.
    pub async fn save_as(&self, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        if tokio::fs::rename(&self.path, dest).await.is_err() {
            tokio::fs::copy(&self.path, dest)
                .await
                .with_context(|| format!("failed to save download to {}", dest.display()))?;
            let _ = tokio::fs::remove_file(&self.path).await;
        }
        Ok(())
    }
}

/// One cookie of the authenticated session, in the shape persisted to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// A single browser tab the pipeline drives.
///
/// Methods with default bodies are expressed through [`PageDriver::evaluate`];
/// drivers override them when they have a native equivalent.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the load to settle.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult>;

    /// The URL currently shown.
    async fn current_url(&self) -> Result<String>;

    /// All matches of a CSS selector, in document order.
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>>;

    /// Evaluate a script in the page and return its JSON result.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value>;

    async fn click(&mut self, element: &ElementRef) -> Result<()>;

    async fn screenshot(&mut self, target: &ScreenshotTarget, path: &Path) -> Result<()>;

    /// Perform `trigger` and wait up to `timeout` for a download to finish,
    /// staging it under `staging_dir`. `None` when no download started.
    async fn capture_download(
        &mut self,
        trigger: DownloadTrigger,
        staging_dir: &Path,
        timeout: Duration,
    ) -> Result<Option<Download>>;

    async fn cookies(&self) -> Result<Vec<SessionCookie>>;

    async fn set_cookies(&mut self, cookies: &[SessionCookie]) -> Result<()>;

    /// First match of a CSS selector.
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementSnapshot>> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.query_selector(selector).await?.is_some())
    }

    /// Current value of a form control.
    async fn input_value(&mut self, element: &ElementRef) -> Result<Option<String>> {
        let script = format!(
            "(() => {{ const el = {}; return el ? el.value : null; }})()",
            element.js_expr()
        );
        Ok(self.evaluate(&script).await?.as_str().map(str::to_string))
    }

    /// Set the value of a form control. `false` when the element is gone.
    async fn set_value(&mut self, element: &ElementRef, value: &str) -> Result<bool> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; el.value = {}; return true; }})()",
            element.js_expr(),
            js_string(value)
        );
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    /// Set one inline style property. `false` when the element is gone.
    async fn set_style(&mut self, element: &ElementRef, property: &str, value: &str) -> Result<bool> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; el.style.setProperty({}, {}); return true; }})()",
            element.js_expr(),
            js_string(property),
            js_string(value)
        );
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    /// Detach every element matching any selector; returns how many went.
    async fn remove_elements(&mut self, selectors: &[String]) -> Result<usize> {
        let list = serde_json::Value::from(selectors.to_vec()).to_string();
        let script = format!(
            "(() => {{ let n = 0; for (const s of {list}) {{ document.querySelectorAll(s).forEach(el => {{ el.remove(); n++; }}); }} return n; }})()"
        );
        Ok(self.evaluate(&script).await?.as_u64().unwrap_or(0) as usize)
    }
}

/// Quote a string as a JS literal.
pub fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
