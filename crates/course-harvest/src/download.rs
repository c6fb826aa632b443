// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-kind extraction of a single resource.

use crate::config::HarvestConfig;
use crate::driver::{Download, DownloadTrigger, PageDriver};
use crate::error::HarvestError;
use crate::model::{ExtractionArtifact, Resource, ResourceKind};
use crate::output::{download_filename, link_record, write_file, CourseOutput};
use crate::progress::Progress;
use crate::quiz::{QuizQuestionWalker, QuizSummary};
use anyhow::Result;
use std::path::PathBuf;
use url::Url;

/// What extracting one resource produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Files(ExtractionArtifact),
    Quiz(QuizSummary),
}

/// Dispatches a resource to the handler for its kind.
pub struct ResourceDownloader<'a> {
    config: &'a HarvestConfig,
}

impl<'a> ResourceDownloader<'a> {
    pub fn new(config: &'a HarvestConfig) -> Self {
        Self { config }
    }

    #[tracing::instrument(skip_all, fields(kind = %resource.kind, name = %resource.display_name))]
    pub async fn extract(
        &self,
        driver: &mut dyn PageDriver,
        resource: &Resource,
        course: &CourseOutput,
        progress: &mut Progress,
    ) -> Result<Extracted> {
        match resource.kind {
            ResourceKind::Document => {
                let path = self.document(driver, resource, course).await?;
                Ok(Extracted::Files(ExtractionArtifact {
                    download: Some(path),
                    ..Default::default()
                }))
            }
            ResourceKind::Folder => {
                let path = self.folder(driver, resource, course).await?;
                Ok(Extracted::Files(ExtractionArtifact {
                    download: Some(path),
                    ..Default::default()
                }))
            }
            ResourceKind::ExternalLink => {
                let path = self.link(driver, resource, course).await?;
                Ok(Extracted::Files(ExtractionArtifact {
                    link_record: Some(path),
                    ..Default::default()
                }))
            }
            ResourceKind::Quiz => {
                let out = course.quiz(&resource.display_name);
                let summary = QuizQuestionWalker::new(self.config)
                    .walk(driver, resource, &out, progress)
                    .await?;
                Ok(Extracted::Quiz(summary))
            }
        }
    }

    /// Navigating to a document starts its download; the navigation itself
    /// failing is expected.
    async fn document(
        &self,
        driver: &mut dyn PageDriver,
        resource: &Resource,
        course: &CourseOutput,
    ) -> Result<PathBuf> {
        let download = driver
            .capture_download(
                DownloadTrigger::Navigate(resource.url.clone()),
                &course.staging_dir(),
                self.config.timing.download_timeout(),
            )
            .await?
            .ok_or_else(|| HarvestError::NoDownload(resource.display_name.clone()))?;
        self.store(download, resource, course).await
    }

    /// Folders download through their "download as archive" control; there
    /// is no fallback when it is missing.
    async fn folder(
        &self,
        driver: &mut dyn PageDriver,
        resource: &Resource,
        course: &CourseOutput,
    ) -> Result<PathBuf> {
        driver.navigate(&resource.url).await?;
        let control = driver
            .query_selector(&self.config.selectors.folder_archive_control)
            .await?
            .ok_or_else(|| HarvestError::NoDownloadControl(resource.display_name.clone()))?;
        let download = driver
            .capture_download(
                DownloadTrigger::Click(control.handle),
                &course.staging_dir(),
                self.config.timing.download_timeout(),
            )
            .await?
            .ok_or_else(|| HarvestError::NoDownload(resource.display_name.clone()))?;
        self.store(download, resource, course).await
    }

    async fn store(
        &self,
        download: Download,
        resource: &Resource,
        course: &CourseOutput,
    ) -> Result<PathBuf> {
        let name = download_filename(
            download.suggested_filename.as_deref(),
            &resource.display_name,
            resource.kind,
        );
        let dest = course.documents_dir().join(name);
        download.save_as(&dest).await?;
        tracing::info!(path = %dest.display(), "saved download");
        Ok(dest)
    }

    /// Resolve where an external link really points and record it.
    async fn link(
        &self,
        driver: &mut dyn PageDriver,
        resource: &Resource,
        course: &CourseOutput,
    ) -> Result<PathBuf> {
        let target = self.resolve_link(driver, resource).await?;
        let path = course.link_record(&resource.display_name);
        write_file(&path, link_record(&resource.display_name, &target)).await?;
        tracing::info!(url = %target, "recorded link");
        Ok(path)
    }

    /// Either the browser left the portal, or the portal shows a workaround
    /// notice holding the target. Anything else is unresolvable.
    pub async fn resolve_link(&self, driver: &mut dyn PageDriver, resource: &Resource) -> Result<String> {
        let nav = driver.navigate(&resource.url).await?;
        let landed = nav.final_url;
        if self.is_off_domain(&landed) {
            return Ok(landed);
        }

        let notice = driver
            .query_selector(&self.config.selectors.link_workaround)
            .await?;
        if let Some(href) = notice.as_ref().and_then(|n| n.attr("href")) {
            let target = Url::parse(&landed)
                .and_then(|base| base.join(href))
                .map(String::from)
                .unwrap_or_else(|_| href.to_string());
            return Ok(target);
        }

        Err(HarvestError::UnresolvedLink {
            name: resource.display_name.clone(),
            url: landed,
        }
        .into())
    }

    fn is_off_domain(&self, url: &str) -> bool {
        let Some(portal) = self.config.base_host() else {
            return false;
        };
        match Url::parse(url).ok().as_ref().and_then(Url::host_str) {
            Some(host) => !host.eq_ignore_ascii_case(&portal),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timing;
    use crate::driver::memory::{ClickEffect, MemoryDriver, ScriptedDownload};
    use crate::output::OutputLayout;

    const BASE: &str = "https://portal.example";

    fn config() -> HarvestConfig {
        HarvestConfig {
            base_url: BASE.to_string(),
            timing: Timing::instant(),
            ..Default::default()
        }
    }

    async fn run(
        driver: &mut MemoryDriver,
        resource: &Resource,
        root: &std::path::Path,
    ) -> Result<Extracted> {
        let config = config();
        let course = OutputLayout::new(root).course("Course");
        ResourceDownloader::new(&config)
            .extract(driver, resource, &course, &mut Progress::silent())
            .await
    }

    #[tokio::test]
    async fn document_uses_suggested_name() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{BASE}/mod/resource/view.php?id=1");
        let mut driver = MemoryDriver::new();
        driver.add_download(&url, ScriptedDownload::new(Some("week1.pdf"), b"%PDF-1.7".to_vec()));

        let resource = Resource::new("Week 1 slides", &url, ResourceKind::Document);
        let extracted = run(&mut driver, &resource, dir.path()).await.unwrap();
        let expected = dir.path().join("Course/documents/week1.pdf");
        assert_eq!(
            extracted,
            Extracted::Files(ExtractionArtifact {
                download: Some(expected.clone()),
                ..Default::default()
            })
        );
        assert_eq!(std::fs::read(expected).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn document_without_suggestion_falls_back_to_display_name() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{BASE}/mod/resource/view.php?id=1");
        let mut driver = MemoryDriver::new();
        driver.add_download(&url, ScriptedDownload::new(None, b"x".to_vec()));

        let resource = Resource::new("Syllabus (2026)", &url, ResourceKind::Document);
        run(&mut driver, &resource, dir.path()).await.unwrap();
        assert!(dir.path().join("Course/documents/Syllabus_2026.pdf").exists());
    }

    #[tokio::test]
    async fn document_that_never_downloads_fails() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{BASE}/mod/resource/view.php?id=1");
        let mut driver = MemoryDriver::new();
        driver.add_page(&url, "<p>Embedded viewer</p>");

        let resource = Resource::new("Slides", &url, ResourceKind::Document);
        let err = run(&mut driver, &resource, dir.path()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarvestError>(),
            Some(HarvestError::NoDownload(_))
        ));
    }

    #[tokio::test]
    async fn folder_clicks_archive_control() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{BASE}/mod/folder/view.php?id=3");
        let control = "form[action*='download_folder.php'] button[type='submit']";
        let mut driver = MemoryDriver::new();
        driver.add_page(
            &url,
            r#"<form action="https://portal.example/mod/folder/download_folder.php"><button type="submit">Download folder</button></form>"#,
        );
        driver.on_click(
            &url,
            control,
            ClickEffect::Download(ScriptedDownload::new(None, b"PK".to_vec())),
        );

        let resource = Resource::new("Lab files", &url, ResourceKind::Folder);
        run(&mut driver, &resource, dir.path()).await.unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("Course/documents/Lab_files.zip")).unwrap(),
            b"PK"
        );
    }

    #[tokio::test]
    async fn folder_without_control_fails() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{BASE}/mod/folder/view.php?id=3");
        let mut driver = MemoryDriver::new();
        driver.add_page(&url, "<ul><li>a.c</li></ul>");

        let resource = Resource::new("Lab files", &url, ResourceKind::Folder);
        let err = run(&mut driver, &resource, dir.path()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HarvestError>(),
            Some(HarvestError::NoDownloadControl(_))
        ));
    }

    #[tokio::test]
    async fn link_via_workaround_notice() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{BASE}/mod/url/view.php?id=5");
        let mut driver = MemoryDriver::new();
        driver.add_page(
            &url,
            r#"<div class="urlworkaround">Click <a href="https://docs.example/ref">https://docs.example/ref</a> link.</div>"#,
        );

        let resource = Resource::new("Reference", &url, ResourceKind::ExternalLink);
        run(&mut driver, &resource, dir.path()).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("Course/links/Reference.txt")).unwrap(),
            "Name: Reference\nURL: https://docs.example/ref\n"
        );
    }

    #[tokio::test]
    async fn on_domain_link_without_notice_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("{BASE}/mod/url/view.php?id=5");
        let mut driver = MemoryDriver::new();
        driver.add_page(&url, "<p>Nothing here</p>");

        let resource = Resource::new("Reference", &url, ResourceKind::ExternalLink);
        let err = run(&mut driver, &resource, dir.path()).await.unwrap_err();
        match err.downcast_ref::<HarvestError>() {
            Some(HarvestError::UnresolvedLink { name, url: landed }) => {
                assert_eq!(name, "Reference");
                assert_eq!(landed, &url);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dir.path().join("Course/links/Reference.txt").exists());
    }
}
