// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! `harvest run`: the full extraction.

use crate::cli::output::{self, Styled};
use crate::cli::{load_config, Overrides};
use anyhow::Result;
use course_harvest::driver::chromium::ChromiumDriver;
use course_harvest::progress::{self, Progress};
use course_harvest::prompt::{ChoiceGroup, Prompter, ScriptedPrompter, TerminalPrompter};
use course_harvest::session::Credentials;
use course_harvest::Harvester;
use indicatif::ProgressBar;
use std::path::Path;
use std::time::Instant;

/// Pauses the spinner while the operator is being asked something.
struct SuspendingPrompter<P> {
    inner: P,
    bar: ProgressBar,
}

impl<P: Prompter> Prompter for SuspendingPrompter<P> {
    fn select(&mut self, title: &str, groups: &[ChoiceGroup]) -> Result<Vec<usize>> {
        let inner = &mut self.inner;
        self.bar.suspend(|| inner.select(title, groups))
    }

    fn credentials(&mut self) -> Result<Credentials> {
        let inner = &mut self.inner;
        self.bar.suspend(|| inner.credentials())
    }
}

pub async fn run(config_path: Option<&Path>, overrides: &Overrides, all: bool) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let s = Styled::new();
    let start = Instant::now();

    let bar = output::spinner();
    bar.set_message(format!("Launching browser for {}", config.base_url));
    let (tx, rx) = progress::channel();
    let renderer = tokio::spawn(output::render(rx, bar.clone()));

    let mut prompter: Box<dyn Prompter> = if all {
        Box::new(ScriptedPrompter::new(&[]))
    } else {
        Box::new(SuspendingPrompter {
            inner: TerminalPrompter::new()?,
            bar: bar.clone(),
        })
    };

    let mut driver = match ChromiumDriver::launch(&config).await {
        Ok(driver) => driver,
        Err(e) => {
            bar.finish_and_clear();
            return Err(e);
        }
    };
    // Quiet runs keep warnings in the log instead of the hidden spinner.
    let mut progress = Progress::new((!output::is_quiet()).then_some(tx));
    tracing::info!(run_id = progress.run_id(), "starting harvest");

    let result = Harvester::new(&config)
        .run(&mut driver, prompter.as_mut(), &mut progress)
        .await;

    drop(progress);
    let _ = renderer.await;
    if let Err(e) = driver.shutdown().await {
        tracing::debug!("browser shutdown: {e:#}");
    }

    let summary = result?;
    if !output::is_quiet() {
        eprintln!();
        eprintln!(
            "  {} Harvest complete: {} course(s), {} of {} resource(s) extracted in {:.1}s",
            s.ok_sym(),
            summary.courses,
            summary.succeeded,
            summary.resources,
            start.elapsed().as_secs_f64()
        );
        eprintln!("  Output: {}", s.dim(&config.output_dir.display().to_string()));
    }
    Ok(())
}
