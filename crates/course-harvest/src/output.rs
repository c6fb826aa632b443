// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Output tree layout and file emission.
//!
//! ```text
//! <root>/<course>/
//!   course.png
//!   documents/<file>.pdf|.zip
//!   links/<name>.txt
//!   <quiz>/<number>.md
//!   <quiz>/screenshots/<number>.png
//! ```
//!
//! Every path component derived from page text goes through [`clean_filename`].
//! Files are written whole; a re-run overwrites by path.

use crate::model::ResourceKind;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const FALLBACK_NAME: &str = "untitled";

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("valid regex"))
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Strip everything but word characters, whitespace and hyphens, then
/// collapse whitespace runs to a single underscore. Idempotent.
pub fn clean_filename(name: &str) -> String {
    let stripped = disallowed().replace_all(name, "");
    let cleaned = whitespace_run().replace_all(stripped.trim(), "_");
    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.into_owned()
    }
}

/// Name a downloaded file: the browser's suggestion (final path component
/// only), else the cleaned display name with the kind's fallback extension.
pub fn download_filename(suggested: Option<&str>, display_name: &str, kind: ResourceKind) -> String {
    let suggested = suggested
        .and_then(|s| Path::new(s).file_name())
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "." && *s != "..");
    if let Some(name) = suggested {
        return name.to_string();
    }
    let base = clean_filename(display_name);
    match kind.fallback_extension() {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

/// Text of a link record.
pub fn link_record(name: &str, url: &str) -> String {
    format!("Name: {name}\nURL: {url}\n")
}

/// Root of the output tree.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn course(&self, course_name: &str) -> CourseOutput {
        CourseOutput {
            dir: self.root.join(clean_filename(course_name)),
        }
    }
}

/// Paths within one course's folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutput {
    dir: PathBuf,
}

impl CourseOutput {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot(&self) -> PathBuf {
        self.dir.join("course.png")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.dir.join("documents")
    }

    pub fn link_record(&self, display_name: &str) -> PathBuf {
        self.dir
            .join("links")
            .join(format!("{}.txt", clean_filename(display_name)))
    }

    /// Where the driver stages downloads before they are moved into place.
    pub fn staging_dir(&self) -> PathBuf {
        self.dir.join(".staging")
    }

    pub fn quiz(&self, quiz_name: &str) -> QuizOutput {
        QuizOutput {
            dir: self.dir.join(clean_filename(quiz_name)),
        }
    }
}

/// Paths within one quiz's folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutput {
    dir: PathBuf,
}

impl QuizOutput {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn markdown(&self, number: &str) -> PathBuf {
        self.dir.join(format!("{}.md", clean_filename(number)))
    }

    pub fn screenshot(&self, number: &str) -> PathBuf {
        self.dir
            .join("screenshots")
            .join(format!("{}.png", clean_filename(number)))
    }
}

/// Write `contents` to `path`, creating parent directories.
pub async fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}
