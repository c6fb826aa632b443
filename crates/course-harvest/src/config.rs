// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration loading and resolution.
//!
//! Every site constant the pipeline relies on (portal URL, DOM patterns,
//! placeholder program, wait bounds) lives in [`HarvestConfig`], which is
//! handed to each component at construction.

use crate::wait::WaitPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// The probe program submitted to force a coding question to render its results.
pub const DEFAULT_PLACEHOLDER_CODE: &str = "int main() {\n  return 0;\n}\n";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Portal root; also defines which host counts as "on-domain".
    pub base_url: String,
    /// Root of the output tree.
    pub output_dir: PathBuf,
    /// Serialized cookie jar of the authenticated session.
    pub cookie_file: PathBuf,
    pub headless: bool,
    pub chromium_path: Option<PathBuf>,
    /// Course names to process without prompting (case-insensitive substring).
    pub courses: Vec<String>,
    pub placeholder_code: String,
    /// Info string for fenced code blocks.
    pub code_language: String,
    pub selectors: Selectors,
    pub timing: Timing,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: "https://courses.finki.ukim.mk".to_string(),
            output_dir: PathBuf::from("output"),
            cookie_file: PathBuf::from("cookies.json"),
            headless: true,
            chromium_path: None,
            courses: Vec::new(),
            placeholder_code: DEFAULT_PLACEHOLDER_CODE.to_string(),
            code_language: "cpp".to_string(),
            selectors: Selectors::default(),
            timing: Timing::default(),
        }
    }
}

/// DOM patterns for the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub section: String,
    pub section_name: String,
    pub activity_link: String,
    pub display_name: String,
    pub accessible_marker: String,
    pub document_href: String,
    pub folder_href: String,
    pub link_href: String,
    /// Accessible text that identifies a quiz activity.
    pub quiz_marker: String,
    pub course_link: String,

    pub question_button: String,
    /// Class that marks a question with a saved answer.
    pub saved_answer_class: String,
    pub content_region: String,
    pub outcome_table: String,
    pub answer_editor: String,
    pub reset_control: String,
    pub reset_attribute: String,
    pub check_control: String,
    /// Interactive widgets stripped from the content region.
    pub noise: Vec<String>,
    /// Page chrome that carries the signed-in user's identity.
    pub privacy_chrome: Vec<String>,

    pub attempt_button: String,
    pub resume_labels: Vec<String>,
    pub start_labels: Vec<String>,

    pub folder_archive_control: String,
    pub link_workaround: String,

    pub login_link: String,
    pub username_field: String,
    pub password_field: String,
    pub login_submit: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            section: "li.section.main".to_string(),
            section_name: ".sectionname span".to_string(),
            activity_link: "a.aalink".to_string(),
            display_name: ".instancename".to_string(),
            accessible_marker: ".accesshide".to_string(),
            document_href: "/mod/resource/view.php".to_string(),
            folder_href: "/mod/folder/view.php".to_string(),
            link_href: "/mod/url/view.php".to_string(),
            quiz_marker: "Quiz".to_string(),
            course_link: "a[href*='/course/view.php']".to_string(),

            question_button: "a.qnbutton".to_string(),
            saved_answer_class: "answersaved".to_string(),
            content_region: "div.content".to_string(),
            outcome_table: ".outcome table".to_string(),
            answer_editor: "textarea.coderunner-answer".to_string(),
            reset_control: "input[type='button'].answer_reset_btn".to_string(),
            reset_attribute: "data-reload-text".to_string(),
            check_control: "input[type='submit'][value='Check']".to_string(),
            noise: vec![
                ".ui_wrapper".to_string(),
                ".im-controls".to_string(),
                ".prompt".to_string(),
                "textarea.coderunner-answer".to_string(),
            ],
            privacy_chrome: vec![".navbar".to_string(), "footer".to_string()],

            attempt_button: "button[type='submit']".to_string(),
            resume_labels: vec!["Continue the last attempt".to_string()],
            start_labels: vec!["Attempt quiz now".to_string()],

            folder_archive_control: "form[action*='download_folder.php'] button[type='submit']"
                .to_string(),
            link_workaround: ".urlworkaround a".to_string(),

            login_link: "a[href*='/login/index.php']".to_string(),
            username_field: "#username".to_string(),
            password_field: "#password".to_string(),
            login_submit: ".btn-submit".to_string(),
        }
    }
}

impl Selectors {
    /// Scope a selector to descendants of the content region.
    pub fn in_content(&self, selector: &str) -> String {
        format!("{} {}", self.content_region, selector)
    }
}

/// Wait bounds for every suspension point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Bound on a single page load.
    pub navigation_timeout_ms: u64,
    pub login: WaitPolicy,
    pub quiz_entry: WaitPolicy,
    pub probe_settle: WaitPolicy,
    pub chrome_removal: WaitPolicy,
    /// Bound on a download finishing once triggered.
    pub download_timeout_ms: u64,
    pub sanitize_attempts: u32,
    pub sanitize_interval_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            login: WaitPolicy::new(250, 10_000),
            quiz_entry: WaitPolicy::new(250, 5_000),
            probe_settle: WaitPolicy::new(250, 5_000),
            chrome_removal: WaitPolicy::new(100, 3_000),
            download_timeout_ms: 60_000,
            sanitize_attempts: 10,
            sanitize_interval_ms: 100,
        }
    }
}

impl Timing {
    /// Near-zero bounds, for tests and dry runs against in-memory pages.
    pub fn instant() -> Self {
        Self {
            navigation_timeout_ms: 0,
            login: WaitPolicy::immediate(),
            quiz_entry: WaitPolicy::immediate(),
            probe_settle: WaitPolicy::immediate(),
            chrome_removal: WaitPolicy::immediate(),
            download_timeout_ms: 0,
            sanitize_attempts: 10,
            sanitize_interval_ms: 0,
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }
}

impl HarvestConfig {
    /// Load configuration from a resolved path, or defaults when none exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match resolve_config_path() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .with_context(|| format!("invalid base_url: {}", self.base_url))
    }

    /// Host of the portal, used to decide whether a link left the site.
    pub fn base_host(&self) -> Option<String> {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

/// Find a config file: `HARVEST_CONFIG`, then `./harvest.json`, then
/// `~/.course-harvest/config.json`.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("HARVEST_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    let cwd = PathBuf::from("harvest.json");
    if cwd.exists() {
        return Some(cwd);
    }

    let home = dirs::home_dir()?.join(".course-harvest/config.json");
    home.exists().then_some(home)
}
