// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Records produced and consumed by the pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A course listed on the portal dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub name: String,
    pub url: String,
}

/// What kind of learning resource a link points at.
///
/// Assigned once at discovery; it selects both the handler and the output
/// subfolder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Document,
    Folder,
    ExternalLink,
    Quiz,
}

impl ResourceKind {
    /// Order in which a section's type-scans are concatenated.
    pub const SCAN_ORDER: [ResourceKind; 4] = [
        ResourceKind::Document,
        ResourceKind::Folder,
        ResourceKind::ExternalLink,
        ResourceKind::Quiz,
    ];

    /// Extension used when the browser supplies no download filename.
    pub fn fallback_extension(&self) -> Option<&'static str> {
        match self {
            Self::Document => Some("pdf"),
            Self::Folder => Some("zip"),
            Self::ExternalLink | Self::Quiz => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Folder => write!(f, "folder"),
            Self::ExternalLink => write!(f, "link"),
            Self::Quiz => write!(f, "quiz"),
        }
    }
}

/// A single linked item within a course section. The URL is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub display_name: String,
    pub url: String,
    pub kind: ResourceKind,
}

impl Resource {
    pub fn new(display_name: impl Into<String>, url: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            display_name: display_name.into(),
            url: url.into(),
            kind,
        }
    }
}

/// Resources of one course page, grouped by section in document order.
///
/// Sections without resources are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceGroup {
    sections: Vec<(String, Vec<Resource>)>,
}

impl ResourceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section. Empty sections are dropped; a repeated name is
    /// merged into the earlier entry so insertion order is preserved.
    pub fn push_section(&mut self, name: impl Into<String>, resources: Vec<Resource>) {
        if resources.is_empty() {
            return;
        }
        let name = name.into();
        match self.sections.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => existing.extend(resources),
            None => self.sections.push((name, resources)),
        }
    }

    pub fn get(&self, section: &str) -> Option<&[Resource]> {
        self.sections
            .iter()
            .find(|(n, _)| n == section)
            .map(|(_, r)| r.as_slice())
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &[Resource])> {
        self.sections.iter().map(|(n, r)| (n.as_str(), r.as_slice()))
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// All resources, flattened in section order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.sections.iter().flat_map(|(_, r)| r.iter())
    }

    pub fn len(&self) -> usize {
        self.sections.iter().map(|(_, r)| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.resources().filter(|r| r.kind == kind).count()
    }
}

/// One entry of a quiz's question navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Numeric token of the label, or the raw trimmed label if it has none.
    pub number: String,
    /// Absolute URL of the question page.
    pub link: String,
    /// Whether the navigation control carries the saved-answer marker.
    pub completed: bool,
}

/// Files written for one question or resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionArtifact {
    pub markdown: Option<PathBuf>,
    pub screenshot: Option<PathBuf>,
    pub download: Option<PathBuf>,
    pub link_record: Option<PathBuf>,
}

impl ExtractionArtifact {
    pub fn is_empty(&self) -> bool {
        self.markdown.is_none()
            && self.screenshot.is_none()
            && self.download.is_none()
            && self.link_record.is_none()
    }
}
