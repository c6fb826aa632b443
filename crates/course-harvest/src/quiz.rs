// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Quiz traversal.
//!
//! Entering a quiz resumes an attempt in progress if one exists, otherwise
//! starts one. Each question from the navigation panel is then visited in
//! turn: probe, strip chrome, read code, sanitize, convert, screenshot.
//! A failing question is logged and the walk moves on.

use crate::config::HarvestConfig;
use crate::driver::{ElementSnapshot, PageDriver, ScreenshotTarget};
use crate::error::HarvestError;
use crate::model::{ExtractionArtifact, QuizQuestion, Resource};
use crate::normalize::{CodeBlocks, ContentNormalizer};
use crate::output::{write_file, QuizOutput};
use crate::probe::{LoadProbe, ProbeOutcome};
use crate::progress::{Progress, ProgressEventKind};
use crate::sanitize::ContentSanitizer;
use crate::wait::{wait_for, Readiness};
use anyhow::Result;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// Width the content region is pinned to before its screenshot.
pub const SCREENSHOT_WIDTH: &str = "1366px";

/// How a quiz was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptEntry {
    Resumed,
    Started,
}

/// Tally of one quiz walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuizSummary {
    pub questions: usize,
    pub processed: usize,
    pub failed: usize,
    /// Questions whose content may lack test-case detail.
    pub partial: usize,
}

fn digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

/// Read one question-navigation control.
///
/// The number is the first digit run of the label, or the trimmed label when
/// it has none. A `#` (or missing) href means the page currently shown.
pub fn parse_question(control: &ElementSnapshot, saved_class: &str, current: &Url) -> QuizQuestion {
    let label = control.text.trim();
    let number = digit_run()
        .find(label)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| label.to_string());

    let link = match control.attr("href").map(str::trim) {
        None | Some("") | Some("#") => current.to_string(),
        Some(href) => current
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string()),
    };

    let completed = control.has_class(saved_class) || contains_class(&control.inner_html, saved_class);

    QuizQuestion {
        number,
        link,
        completed,
    }
}

fn contains_class(html: &str, class: &str) -> bool {
    let Ok(selector) = Selector::parse(&format!(".{class}")) else {
        return false;
    };
    Html::parse_fragment(html).select(&selector).next().is_some()
}

fn label_matches(text: &str, labels: &[String]) -> bool {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    labels.iter().any(|l| text == l.to_lowercase())
}

pub struct QuizQuestionWalker<'a> {
    config: &'a HarvestConfig,
    normalizer: ContentNormalizer,
}

impl<'a> QuizQuestionWalker<'a> {
    pub fn new(config: &'a HarvestConfig) -> Self {
        Self {
            config,
            normalizer: ContentNormalizer::new(&config.placeholder_code, &config.code_language),
        }
    }

    /// Click the resume control, else the start control, on the quiz's
    /// landing page. `None` when neither is offered.
    pub async fn enter_attempt(&self, driver: &mut dyn PageDriver) -> Result<Option<AttemptEntry>> {
        let selectors = &self.config.selectors;
        let buttons = driver.query_selector_all(&selectors.attempt_button).await?;

        let resume = buttons
            .iter()
            .find(|b| label_matches(&b.text, &selectors.resume_labels));
        let start = buttons
            .iter()
            .find(|b| label_matches(&b.text, &selectors.start_labels));
        let (button, entry) = match (resume, start) {
            (Some(b), _) => (b, AttemptEntry::Resumed),
            (None, Some(b)) => (b, AttemptEntry::Started),
            (None, None) => return Ok(None),
        };

        driver.click(&button.handle).await?;
        let ready = wait_for(
            driver,
            Readiness::Present(&selectors.question_button),
            &self.config.timing.quiz_entry,
        )
        .await?;
        if !ready {
            tracing::warn!(?entry, "question navigation did not appear after entering attempt");
        }
        Ok(Some(entry))
    }

    /// Question controls on the current attempt page.
    pub async fn list_questions(&self, driver: &dyn PageDriver) -> Result<Vec<QuizQuestion>> {
        let current_url = driver.current_url().await?;
        let current =
            Url::parse(&current_url).map_err(|_| HarvestError::InvalidUrl(current_url.clone()))?;
        let controls = driver
            .query_selector_all(&self.config.selectors.question_button)
            .await?;
        Ok(controls
            .iter()
            .map(|c| parse_question(c, &self.config.selectors.saved_answer_class, &current))
            .collect())
    }

    /// Walk every question of `quiz`, writing into `out`.
    #[tracing::instrument(skip_all, fields(quiz = %quiz.display_name))]
    pub async fn walk(
        &self,
        driver: &mut dyn PageDriver,
        quiz: &Resource,
        out: &QuizOutput,
        progress: &mut Progress,
    ) -> Result<QuizSummary> {
        driver.navigate(&quiz.url).await?;
        let Some(entry) = self.enter_attempt(driver).await? else {
            return Err(HarvestError::QuizUnavailable(quiz.display_name.clone()).into());
        };

        let questions = self.list_questions(driver).await?;
        tracing::info!(?entry, questions = questions.len(), "entered quiz");
        if questions.is_empty() {
            return Err(HarvestError::NoQuestions(quiz.display_name.clone()).into());
        }

        let mut summary = QuizSummary {
            questions: questions.len(),
            ..Default::default()
        };
        for question in &questions {
            match self.process_question(driver, question, out, progress).await {
                Ok((artifact, _)) if artifact.is_empty() => {
                    summary.failed += 1;
                    progress.warn(format!(
                        "{}: question {} produced no files",
                        quiz.display_name, question.number
                    ));
                }
                Ok((_, outcome)) => {
                    summary.processed += 1;
                    if outcome.is_partial() {
                        summary.partial += 1;
                    }
                    progress.emit(ProgressEventKind::QuestionProcessed {
                        quiz: quiz.display_name.clone(),
                        number: question.number.clone(),
                        completed: question.completed,
                        partial: outcome.is_partial(),
                    });
                }
                Err(e) => {
                    summary.failed += 1;
                    progress.warn(format!(
                        "{}: question {} failed: {e:#}",
                        quiz.display_name, question.number
                    ));
                }
            }
        }
        Ok(summary)
    }

    /// Navigate, probe, sanitize, convert and screenshot one question.
    ///
    /// A missing content region omits the Markdown step; the screenshot is
    /// still attempted, falling back to the full page.
    pub async fn process_question(
        &self,
        driver: &mut dyn PageDriver,
        question: &QuizQuestion,
        out: &QuizOutput,
        progress: &mut Progress,
    ) -> Result<(ExtractionArtifact, ProbeOutcome)> {
        let selectors = &self.config.selectors;
        let sanitizer = ContentSanitizer::new(selectors, &self.config.timing);

        tracing::info!(number = %question.number, completed = question.completed, "processing question");
        driver.navigate(&question.link).await?;

        let outcome = LoadProbe::new(self.config).reveal(driver).await?;
        if outcome.is_partial() {
            progress.warn(format!("question {}: {outcome}", question.number));
        }
        if let Err(e) = sanitizer.remove_chrome(driver).await {
            progress.warn(format!(
                "question {}: could not hide page chrome: {e:#}",
                question.number
            ));
        }

        let code = match self.read_code(driver).await {
            Ok(code) => code,
            Err(e) => {
                progress.warn(format!("question {}: could not read code: {e:#}", question.number));
                CodeBlocks::default()
            }
        };
        if let Err(e) = sanitizer.sanitize(driver).await {
            progress.warn(format!("question {}: sanitizing failed: {e:#}", question.number));
        }

        let mut artifact = ExtractionArtifact::default();
        let content = driver.query_selector(&selectors.content_region).await?;
        match &content {
            Some(region) => {
                let path = out.markdown(&question.number);
                let written = match self.normalizer.normalize(&region.inner_html, &code) {
                    Ok(markdown) => write_file(&path, markdown).await,
                    Err(e) => Err(e),
                };
                match written {
                    Ok(()) => artifact.markdown = Some(path),
                    Err(e) => progress.warn(format!("question {}: {e:#}", question.number)),
                }
            }
            None => progress.warn(format!(
                "question {}: no content region, skipping markdown",
                question.number
            )),
        }

        let shot = out.screenshot(&question.number);
        let target = match &content {
            Some(region) => {
                if let Err(e) = driver
                    .set_style(&region.handle, "width", SCREENSHOT_WIDTH)
                    .await
                {
                    tracing::debug!("could not pin content width: {e:#}");
                }
                ScreenshotTarget::Element(region.handle.clone())
            }
            None => ScreenshotTarget::FullPage,
        };
        match driver.screenshot(&target, &shot).await {
            Ok(()) => artifact.screenshot = Some(shot),
            Err(e) => progress.warn(format!(
                "question {}: screenshot failed: {e:#}",
                question.number
            )),
        }

        Ok((artifact, outcome))
    }

    async fn read_code(&self, driver: &mut dyn PageDriver) -> Result<CodeBlocks> {
        let selectors = &self.config.selectors;
        let starter = driver
            .query_selector(&selectors.reset_control)
            .await?
            .and_then(|reset| reset.attr(&selectors.reset_attribute).map(str::to_string));
        let saved = match driver.query_selector(&selectors.answer_editor).await? {
            Some(editor) => driver.input_value(&editor.handle).await?,
            None => None,
        };
        Ok(CodeBlocks { starter, saved })
    }
}
