// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resource discovery on a course page, and course discovery on the dashboard.
//!
//! Section markup is snapshotted once through the driver and parsed into
//! [`LinkDescriptor`]s; [`classify`] is a pure function over those, so the
//! rules can be exercised without a page.

use crate::config::Selectors;
use crate::driver::PageDriver;
use crate::model::{Course, Resource, ResourceGroup, ResourceKind};
use anyhow::{anyhow, Result};
use scraper::{Html, Selector};
use url::Url;

/// Driver-agnostic description of one activity link.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkDescriptor {
    /// Lower-case tag name.
    pub tag: String,
    pub href: Option<String>,
    /// Leading text of the display-name sub-element; `None` when that
    /// sub-element is missing.
    pub name: Option<String>,
    /// Screen-reader-only text inside the link, such as " Quiz".
    pub marker: Option<String>,
}

/// One section container: its heading and its activity links in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SectionDescriptor {
    pub name: Option<String>,
    pub links: Vec<LinkDescriptor>,
}

/// Decide a link's kind. `None` means it is not a harvestable resource.
///
/// Quizzes are recognized by their accessible marker text; their URLs do not
/// identify them on their own.
pub fn classify(link: &LinkDescriptor, selectors: &Selectors) -> Option<ResourceKind> {
    if link.tag != "a" {
        return None;
    }
    let href = link.href.as_deref().unwrap_or_default();
    if href.contains(&selectors.document_href) {
        return Some(ResourceKind::Document);
    }
    if href.contains(&selectors.folder_href) {
        return Some(ResourceKind::Folder);
    }
    if href.contains(&selectors.link_href) {
        return Some(ResourceKind::ExternalLink);
    }
    let marker = link.marker.as_deref().unwrap_or_default().to_lowercase();
    if !href.is_empty() && marker.contains(&selectors.quiz_marker.to_lowercase()) {
        return Some(ResourceKind::Quiz);
    }
    None
}

/// Turn one section's links into resources: one scan per kind in
/// [`ResourceKind::SCAN_ORDER`], document order within each scan.
/// Links without a display name are skipped.
pub fn build_section(
    links: &[LinkDescriptor],
    selectors: &Selectors,
    base: Option<&Url>,
) -> Vec<Resource> {
    let mut resources = Vec::new();
    for kind in ResourceKind::SCAN_ORDER {
        for link in links {
            if classify(link, selectors) != Some(kind) {
                continue;
            }
            let (Some(name), Some(href)) = (link.name.as_deref(), link.href.as_deref()) else {
                tracing::debug!(?link, "skipping link without display name");
                continue;
            };
            resources.push(Resource::new(name, resolve(base, href), kind));
        }
    }
    resources
}

/// Parse a section container's markup.
pub fn describe_section(outer_html: &str, selectors: &Selectors) -> Result<SectionDescriptor> {
    let heading = parse_selector(&selectors.section_name)?;
    let link_sel = parse_selector(&selectors.activity_link)?;
    let name_sel = parse_selector(&selectors.display_name)?;
    let marker_sel = parse_selector(&selectors.accessible_marker)?;

    let fragment = Html::parse_fragment(outer_html);
    let name = fragment
        .select(&heading)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|n| !n.is_empty());

    let links = fragment
        .select(&link_sel)
        .map(|a| {
            let display = a.select(&name_sel).next().map(|el| {
                let leading = el
                    .children()
                    .find_map(|c| c.value().as_text().map(|t| t.trim().to_string()))
                    .filter(|t| !t.is_empty());
                leading.unwrap_or_else(|| collapse_whitespace(&el.text().collect::<String>()))
            });
            let marker = a
                .select(&marker_sel)
                .next()
                .map(|el| el.text().collect::<String>());
            LinkDescriptor {
                tag: a.value().name().to_ascii_lowercase(),
                href: a.value().attr("href").map(str::to_string),
                name: display.filter(|n| !n.is_empty()),
                marker,
            }
        })
        .collect();

    Ok(SectionDescriptor { name, links })
}

/// Reads the sections of a loaded course page.
pub struct ResourceCatalog<'a> {
    selectors: &'a Selectors,
}

impl<'a> ResourceCatalog<'a> {
    pub fn new(selectors: &'a Selectors) -> Self {
        Self { selectors }
    }

    /// Group every resource on the current page by section. Read-only.
    #[tracing::instrument(skip_all)]
    pub async fn scan(&self, driver: &dyn PageDriver) -> Result<ResourceGroup> {
        let page_url = driver.current_url().await?;
        let base = Url::parse(&page_url).ok();
        let sections = driver.query_selector_all(&self.selectors.section).await?;

        let mut group = ResourceGroup::new();
        for (i, section) in sections.iter().enumerate() {
            let descriptor = describe_section(&section.outer_html, self.selectors)?;
            // Containers without a heading are layout wrappers, not course sections.
            let Some(name) = descriptor.name else {
                tracing::debug!(index = i, "skipping unnamed section");
                continue;
            };
            let resources = build_section(&descriptor.links, self.selectors, base.as_ref());
            tracing::debug!(section = %name, found = resources.len(), "scanned section");
            group.push_section(name, resources);
        }
        tracing::info!(
            sections = group.sections().count(),
            resources = group.len(),
            "catalogued course page"
        );
        Ok(group)
    }
}

/// List the courses linked from the current page, first occurrence of each URL.
pub async fn discover_courses(driver: &dyn PageDriver, selectors: &Selectors) -> Result<Vec<Course>> {
    let base = Url::parse(&driver.current_url().await?).ok();
    let links = driver.query_selector_all(&selectors.course_link).await?;
    let mut courses: Vec<Course> = Vec::new();
    for link in links {
        let (Some(href), name) = (link.attr("href"), collapse_whitespace(&link.text)) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let url = resolve(base.as_ref(), href);
        if courses.iter().any(|c| c.url == url) {
            continue;
        }
        courses.push(Course { name, url });
    }
    Ok(courses)
}

/// Courses whose name contains any wanted name, case-insensitively.
pub fn match_courses(courses: &[Course], wanted: &[String]) -> Vec<Course> {
    let wanted: Vec<String> = wanted.iter().map(|w| w.to_lowercase()).collect();
    courses
        .iter()
        .filter(|c| {
            let name = c.name.to_lowercase();
            wanted.iter().any(|w| name.contains(w.as_str()))
        })
        .cloned()
        .collect()
}

fn resolve(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(String::from)
        .unwrap_or_else(|| href.to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {selector:?}: {e:?}"))
}
