// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Forces a graded coding question to render its outcome table.
//!
//! The table only appears once the active attempt has a submission, so when
//! it is missing a known-compilable placeholder is written into the answer
//! editor and submitted with the Check control. The placeholder is never
//! reported as the student's answer.

use crate::config::HarvestConfig;
use crate::driver::PageDriver;
use crate::wait::{wait_for, Readiness};
use anyhow::Result;

/// What the probe found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The outcome table was already on the page.
    AlreadyRevealed,
    /// The placeholder was submitted and the outcome table appeared.
    Revealed,
    /// The placeholder was submitted but the outcome table did not appear
    /// within the settle bound. Grading may still be running.
    Unverified,
    /// No answer editor to write into.
    NoEditor,
    /// The placeholder was written but there is no Check control.
    NoCheckControl,
}

impl ProbeOutcome {
    /// The extracted content may lack test-case detail.
    pub fn is_partial(&self) -> bool {
        !matches!(self, Self::AlreadyRevealed | Self::Revealed)
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRevealed => write!(f, "already revealed"),
            Self::Revealed => write!(f, "revealed"),
            Self::Unverified => write!(f, "submitted, outcome not confirmed"),
            Self::NoEditor => write!(f, "no answer editor"),
            Self::NoCheckControl => write!(f, "no check control"),
        }
    }
}

pub struct LoadProbe<'a> {
    config: &'a HarvestConfig,
}

impl<'a> LoadProbe<'a> {
    pub fn new(config: &'a HarvestConfig) -> Self {
        Self { config }
    }

    #[tracing::instrument(skip_all)]
    pub async fn reveal(&self, driver: &mut dyn PageDriver) -> Result<ProbeOutcome> {
        let selectors = &self.config.selectors;
        if driver.exists(&selectors.outcome_table).await? {
            return Ok(ProbeOutcome::AlreadyRevealed);
        }

        let Some(editor) = driver.query_selector(&selectors.answer_editor).await? else {
            tracing::info!("no answer editor; continuing without outcome table");
            return Ok(ProbeOutcome::NoEditor);
        };
        driver
            .set_value(&editor.handle, &self.config.placeholder_code)
            .await?;

        let Some(check) = driver.query_selector(&selectors.check_control).await? else {
            tracing::warn!("no check control; content may lack test-case detail");
            return Ok(ProbeOutcome::NoCheckControl);
        };
        driver.click(&check.handle).await?;

        let settled = wait_for(
            driver,
            Readiness::Present(&selectors.outcome_table),
            &self.config.timing.probe_settle,
        )
        .await?;
        if settled {
            Ok(ProbeOutcome::Revealed)
        } else {
            tracing::warn!("outcome table did not appear after submitting placeholder");
            Ok(ProbeOutcome::Unverified)
        }
    }
}
