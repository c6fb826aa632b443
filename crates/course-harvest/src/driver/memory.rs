// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory page driver over scripted HTML.
//!
//! Pages are HTML strings keyed by URL and queried with real CSS selectors
//! through `scraper`. Clicks and navigations can be scripted to swap the
//! document, follow a link or start a download, which is enough to replay a
//! portal session offline.

use super::{
    Download, DownloadTrigger, ElementRef, ElementSnapshot, NavigationResult, PageDriver,
    ScreenshotTarget, SessionCookie,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bytes written for every screenshot.
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Follow at most this many scripted redirects per navigation.
const MAX_REDIRECTS: usize = 10;

/// What happens when a scripted element is clicked.
#[derive(Debug, Clone)]
pub enum ClickEffect {
    /// Load another scripted page.
    Navigate(String),
    /// Re-render the current URL with new HTML, keeping form values.
    Replace(String),
    /// Start a download.
    Download(ScriptedDownload),
}

/// A download served by a navigation or click.
#[derive(Debug, Clone)]
pub struct ScriptedDownload {
    pub suggested_filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl ScriptedDownload {
    pub fn new(suggested_filename: Option<&str>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            suggested_filename: suggested_filename.map(str::to_string),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone)]
enum PageEntry {
    Html(String),
    Redirect(String),
}

/// A [`PageDriver`] backed by scripted HTML documents.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    pages: HashMap<String, PageEntry>,
    downloads: HashMap<String, ScriptedDownload>,
    click_effects: HashMap<(String, String), ClickEffect>,
    /// Selectors whose matches survive removal, like widgets a page script re-inserts.
    sticky: HashSet<String>,
    /// Selectors whose removal fails, like a page whose context was torn down.
    broken_removals: HashSet<String>,

    current_url: Option<String>,
    current_html: String,
    values: HashMap<ElementRef, String>,
    styles: HashMap<ElementRef, Vec<(String, String)>>,
    pending_download: Option<ScriptedDownload>,
    cookies: Vec<SessionCookie>,

    navigations: Vec<String>,
    clicks: Vec<ElementRef>,
    screenshots: Vec<PathBuf>,
    removal_rounds: usize,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` at `url`.
    pub fn add_page(&mut self, url: &str, html: &str) -> &mut Self {
        self.pages
            .insert(url.to_string(), PageEntry::Html(html.to_string()));
        self
    }

    /// Redirect navigations of `url` to `target`.
    pub fn add_redirect(&mut self, url: &str, target: &str) -> &mut Self {
        self.pages
            .insert(url.to_string(), PageEntry::Redirect(target.to_string()));
        self
    }

    /// Navigating to `url` starts a download and aborts the navigation.
    pub fn add_download(&mut self, url: &str, download: ScriptedDownload) -> &mut Self {
        self.downloads.insert(url.to_string(), download);
        self
    }

    /// Clicking the first `selector` match while at `url` has `effect`.
    pub fn on_click(&mut self, url: &str, selector: &str, effect: ClickEffect) -> &mut Self {
        self.click_effects
            .insert((url.to_string(), selector.to_string()), effect);
        self
    }

    /// Matches of `selector` are reported removed but stay in the document.
    pub fn make_sticky(&mut self, selector: &str) -> &mut Self {
        self.sticky.insert(selector.to_string());
        self
    }

    /// Removing `selector` errors instead of touching the document.
    pub fn fail_removal_of(&mut self, selector: &str) -> &mut Self {
        self.broken_removals.insert(selector.to_string());
        self
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub fn clicks(&self) -> &[ElementRef] {
        &self.clicks
    }

    pub fn screenshots(&self) -> &[PathBuf] {
        &self.screenshots
    }

    /// How many times [`PageDriver::remove_elements`] ran.
    pub fn removal_rounds(&self) -> usize {
        self.removal_rounds
    }

    pub fn html(&self) -> &str {
        &self.current_html
    }

    pub fn style_of(&self, element: &ElementRef, property: &str) -> Option<&str> {
        self.styles
            .get(element)
            .and_then(|s| s.iter().rev().find(|(p, _)| p == property))
            .map(|(_, v)| v.as_str())
    }

    fn load(&mut self, url: &str) -> Result<String> {
        let mut target = url.to_string();
        for _ in 0..=MAX_REDIRECTS {
            match self.pages.get(&target) {
                Some(PageEntry::Html(html)) => {
                    self.current_html = html.clone();
                    self.current_url = Some(target.clone());
                    self.values.clear();
                    self.styles.clear();
                    return Ok(target);
                }
                Some(PageEntry::Redirect(next)) => target = next.clone(),
                None => bail!("no page scripted for {target}"),
            }
        }
        bail!("too many redirects starting at {url}")
    }

    fn element_exists(&self, element: &ElementRef) -> Result<bool> {
        Ok(snapshot_all(&self.current_html, &element.selector)?.len() > element.index)
    }

    fn stage(&self, download: ScriptedDownload, staging_dir: &Path) -> Result<Download> {
        std::fs::create_dir_all(staging_dir)
            .with_context(|| format!("failed to create {}", staging_dir.display()))?;
        let path = staging_dir.join(format!(".{}.part", uuid::Uuid::new_v4()));
        std::fs::write(&path, &download.bytes)
            .with_context(|| format!("failed to stage download at {}", path.display()))?;
        Ok(Download {
            suggested_filename: download.suggested_filename,
            path,
        })
    }
}

#[async_trait]
impl PageDriver for MemoryDriver {
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult> {
        self.navigations.push(url.to_string());
        if let Some(download) = self.downloads.get(url).cloned() {
            self.pending_download = Some(download);
            bail!("navigation to {url} aborted: net::ERR_ABORTED");
        }
        let final_url = self.load(url)?;
        Ok(NavigationResult {
            final_url,
        })
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .current_url
            .clone()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>> {
        snapshot_all(&self.current_html, selector)
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        tracing::debug!(len = script.len(), "script ignored by in-memory driver");
        Ok(serde_json::Value::Null)
    }

    async fn click(&mut self, element: &ElementRef) -> Result<()> {
        if !self.element_exists(element)? {
            bail!("cannot click {}[{}]: not found", element.selector, element.index);
        }
        self.clicks.push(element.clone());
        let url = self.current_url().await?;
        let effect = self
            .click_effects
            .get(&(url.clone(), element.selector.clone()))
            .cloned();
        match effect {
            Some(ClickEffect::Navigate(target)) => {
                self.navigate(&target).await?;
            }
            Some(ClickEffect::Replace(html)) => self.current_html = html,
            Some(ClickEffect::Download(download)) => self.pending_download = Some(download),
            None => {}
        }
        Ok(())
    }

    async fn screenshot(&mut self, target: &ScreenshotTarget, path: &Path) -> Result<()> {
        if let ScreenshotTarget::Element(element) = target {
            if !self.element_exists(element)? {
                bail!("cannot screenshot {}: not found", element.selector);
            }
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, PNG_SIGNATURE)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn capture_download(
        &mut self,
        trigger: DownloadTrigger,
        staging_dir: &Path,
        _timeout: Duration,
    ) -> Result<Option<Download>> {
        self.pending_download = None;
        match &trigger {
            DownloadTrigger::Navigate(url) => {
                if let Err(e) = self.navigate(url).await {
                    tracing::debug!("navigation ended while downloading: {e}");
                }
            }
            DownloadTrigger::Click(element) => self.click(element).await?,
        }
        match self.pending_download.take() {
            Some(download) => Ok(Some(self.stage(download, staging_dir)?)),
            None => Ok(None),
        }
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>> {
        Ok(self.cookies.clone())
    }

    async fn set_cookies(&mut self, cookies: &[SessionCookie]) -> Result<()> {
        self.cookies = cookies.to_vec();
        Ok(())
    }

    async fn input_value(&mut self, element: &ElementRef) -> Result<Option<String>> {
        if let Some(value) = self.values.get(element) {
            return Ok(Some(value.clone()));
        }
        let snapshots = snapshot_all(&self.current_html, &element.selector)?;
        Ok(snapshots.into_iter().nth(element.index).map(|s| {
            if s.tag == "textarea" {
                s.text
            } else {
                s.attr("value").unwrap_or_default().to_string()
            }
        }))
    }

    async fn set_value(&mut self, element: &ElementRef, value: &str) -> Result<bool> {
        if !self.element_exists(element)? {
            return Ok(false);
        }
        self.values.insert(element.clone(), value.to_string());
        Ok(true)
    }

    async fn set_style(&mut self, element: &ElementRef, property: &str, value: &str) -> Result<bool> {
        if !self.element_exists(element)? {
            return Ok(false);
        }
        self.styles
            .entry(element.clone())
            .or_default()
            .push((property.to_string(), value.to_string()));
        Ok(true)
    }

    async fn remove_elements(&mut self, selectors: &[String]) -> Result<usize> {
        self.removal_rounds += 1;
        if let Some(broken) = selectors.iter().find(|s| self.broken_removals.contains(*s)) {
            bail!("cannot remove {broken}: execution context was destroyed");
        }
        let (html, removed) = remove_matching(&self.current_html, selectors, &self.sticky)?;
        self.current_html = html;
        Ok(removed)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {selector:?}: {e:?}"))
}

/// Snapshot every match of `selector` in `html`.
fn snapshot_all(html: &str, selector: &str) -> Result<Vec<ElementSnapshot>> {
    let sel = parse_selector(selector)?;
    let doc = Html::parse_document(html);
    let snapshots = doc
        .select(&sel)
        .enumerate()
        .map(|(index, el)| {
            let value = el.value();
            ElementSnapshot {
                handle: ElementRef::new(selector, index),
                tag: value.name().to_ascii_lowercase(),
                classes: value.classes().map(str::to_string).collect(),
                attributes: value
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
                text: el.text().collect::<String>(),
                inner_html: el.inner_html(),
                outer_html: el.html(),
            }
        })
        .collect();
    Ok(snapshots)
}

/// Detach all matches of `selectors` except sticky ones; sticky matches still count.
fn remove_matching(
    html: &str,
    selectors: &[String],
    sticky: &HashSet<String>,
) -> Result<(String, usize)> {
    let mut doc = Html::parse_document(html);
    let mut removed = 0;
    for selector in selectors {
        let sel = parse_selector(selector)?;
        let ids: Vec<_> = doc.select(&sel).map(|el| el.id()).collect();
        removed += ids.len();
        if sticky.contains(selector) {
            continue;
        }
        for id in ids {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
            }
        }
    }
    Ok((doc.html(), removed))
}
