// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! The top-level run: authenticate, pick courses, and extract each selected
//! resource in turn on a single page.
//!
//! Only authentication failures end the run. Everything below a course is
//! contained at resource or question granularity and surfaces as a warning.

use crate::catalog::{discover_courses, match_courses, ResourceCatalog};
use crate::config::HarvestConfig;
use crate::download::{Extracted, ResourceDownloader};
use crate::driver::{PageDriver, ScreenshotTarget};
use crate::error::HarvestError;
use crate::model::{Course, Resource, ResourceGroup};
use crate::output::{CourseOutput, OutputLayout};
use crate::progress::{Progress, ProgressEventKind};
use crate::prompt::{ChoiceGroup, Prompter};
use crate::sanitize::ContentSanitizer;
use crate::session::{Credentials, SessionManager};
use anyhow::Result;
use std::time::Instant;

/// Counts for the final banner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub courses: usize,
    pub resources: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct Harvester<'a> {
    config: &'a HarvestConfig,
    layout: OutputLayout,
}

impl<'a> Harvester<'a> {
    pub fn new(config: &'a HarvestConfig) -> Self {
        Self {
            config,
            layout: OutputLayout::new(&config.output_dir),
        }
    }

    /// Run the whole pipeline.
    pub async fn run(
        &self,
        driver: &mut dyn PageDriver,
        prompter: &mut dyn Prompter,
        progress: &mut Progress,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        self.authenticate(driver, prompter).await?;

        let courses = self.choose_courses(driver, prompter, progress).await?;
        let mut summary = RunSummary::default();
        for course in &courses {
            summary.courses += 1;
            if let Err(e) = self
                .harvest_course(driver, prompter, progress, course, &mut summary)
                .await
            {
                progress.warn(format!("{}: {e:#}", course.name));
            }
        }

        progress.emit(ProgressEventKind::RunComplete {
            courses: summary.courses as u32,
            resources: summary.resources as u32,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
        tracing::info!(?summary, "run complete");
        Ok(summary)
    }

    /// Restore the saved session and log in if the portal still asks for it.
    pub async fn authenticate(
        &self,
        driver: &mut dyn PageDriver,
        prompter: &mut dyn Prompter,
    ) -> Result<()> {
        let session = SessionManager::new(self.config);
        session.restore(driver).await;
        if !session.needs_login(driver).await? {
            tracing::info!("session still valid");
            return Ok(());
        }

        let credentials = match Credentials::from_env() {
            Some(c) => c,
            None => prompter
                .credentials()
                .map_err(|e| HarvestError::AuthenticationFailed(format!("{e:#}")))?,
        };
        session.login(driver, &credentials).await?;
        if let Err(e) = session.persist(driver).await {
            tracing::warn!("could not save session: {e:#}");
        }
        Ok(())
    }

    /// Courses linked from the portal home.
    pub async fn list_courses(&self, driver: &mut dyn PageDriver) -> Result<Vec<Course>> {
        driver.navigate(&self.config.base_url).await?;
        discover_courses(driver, &self.config.selectors).await
    }

    async fn choose_courses(
        &self,
        driver: &mut dyn PageDriver,
        prompter: &mut dyn Prompter,
        progress: &mut Progress,
    ) -> Result<Vec<Course>> {
        let courses = self.list_courses(driver).await?;
        if courses.is_empty() {
            progress.warn("no courses listed on the portal home");
            return Ok(Vec::new());
        }

        if !self.config.courses.is_empty() {
            let picked = match_courses(&courses, &self.config.courses);
            if picked.is_empty() {
                progress.warn(format!(
                    "none of the configured courses were found: {}",
                    self.config.courses.join(", ")
                ));
            }
            return Ok(picked);
        }

        let labels = courses.iter().map(|c| c.name.clone()).collect();
        let picked = prompter.select("Select courses", &[ChoiceGroup::new("", labels)])?;
        Ok(picked
            .into_iter()
            .filter_map(|i| courses.get(i).cloned())
            .collect())
    }

    #[tracing::instrument(skip_all, fields(course = %course.name))]
    async fn harvest_course(
        &self,
        driver: &mut dyn PageDriver,
        prompter: &mut dyn Prompter,
        progress: &mut Progress,
        course: &Course,
        summary: &mut RunSummary,
    ) -> Result<()> {
        progress.emit(ProgressEventKind::CourseStarted {
            name: course.name.clone(),
            url: course.url.clone(),
        });
        driver.navigate(&course.url).await?;
        let out = self.layout.course(&course.name);

        let group = ResourceCatalog::new(&self.config.selectors)
            .scan(driver)
            .await?;
        self.snapshot_course(driver, &out, progress).await;

        if group.is_empty() {
            progress.warn(format!("{}: no resources found", course.name));
            return Ok(());
        }

        let selected = select_resources(prompter, course, &group)?;
        let downloader = ResourceDownloader::new(self.config);
        for (section, resource) in selected {
            summary.resources += 1;
            progress.emit(ProgressEventKind::ResourceStarted {
                section: section.to_string(),
                name: resource.display_name.clone(),
                kind: resource.kind,
            });

            match downloader.extract(driver, resource, &out, progress).await {
                Ok(extracted) => {
                    summary.succeeded += 1;
                    if let Extracted::Quiz(quiz) = extracted {
                        tracing::info!(?quiz, "quiz done");
                    }
                    progress.emit(ProgressEventKind::ResourceCompleted {
                        name: resource.display_name.clone(),
                        kind: resource.kind,
                    });
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(resource = %resource.display_name, "extraction failed: {e:#}");
                    let event = match e.downcast_ref::<HarvestError>() {
                        Some(HarvestError::QuizUnavailable(_)) => ProgressEventKind::QuizSkipped {
                            name: resource.display_name.clone(),
                            reason: format!("{e:#}"),
                        },
                        _ => ProgressEventKind::ResourceFailed {
                            name: resource.display_name.clone(),
                            kind: resource.kind,
                            reason: format!("{e:#}"),
                        },
                    };
                    progress.emit(event);
                }
            }
        }

        // Only succeeds when every staged download was moved into place.
        let _ = tokio::fs::remove_dir(out.staging_dir()).await;
        Ok(())
    }

    /// Strip identifying chrome and save a full-page `course.png`.
    async fn snapshot_course(
        &self,
        driver: &mut dyn PageDriver,
        out: &CourseOutput,
        progress: &mut Progress,
    ) {
        let sanitizer = ContentSanitizer::new(&self.config.selectors, &self.config.timing);
        if let Err(e) = sanitizer.remove_chrome(driver).await {
            tracing::debug!("chrome removal failed: {e:#}");
        }
        if let Err(e) = driver
            .screenshot(&ScreenshotTarget::FullPage, &out.snapshot())
            .await
        {
            progress.warn(format!("course snapshot failed: {e:#}"));
        }
    }
}

/// Ask which resources to extract, grouped by section.
fn select_resources<'g>(
    prompter: &mut dyn Prompter,
    course: &Course,
    group: &'g ResourceGroup,
) -> Result<Vec<(&'g str, &'g Resource)>> {
    let choices: Vec<ChoiceGroup> = group
        .sections()
        .map(|(name, resources)| {
            ChoiceGroup::new(
                name,
                resources
                    .iter()
                    .map(|r| format!("{} [{}]", r.display_name, r.kind))
                    .collect(),
            )
        })
        .collect();
    let flat: Vec<(&str, &Resource)> = group
        .sections()
        .flat_map(|(name, resources)| resources.iter().map(move |r| (name, r)))
        .collect();

    let picked = prompter.select(&format!("Select resources from {}", course.name), &choices)?;
    Ok(picked.into_iter().filter_map(|i| flat.get(i).copied()).collect())
}
