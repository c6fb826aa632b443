// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Removal of interactive widgets and identifying page chrome.
//!
//! Page scripts may re-insert or late-render widgets, so noise removal is a
//! bounded retry: remove, pause, re-check. Running out of attempts is logged
//! and tolerated.

use crate::config::{Selectors, Timing};
use crate::driver::PageDriver;
use crate::wait::{wait_for, Readiness};
use anyhow::Result;
use std::time::Duration;

/// Outcome of one sanitizing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeReport {
    /// Removal rounds performed.
    pub attempts: u32,
    /// No targeted element remained after the last round.
    pub clean: bool,
}

pub struct ContentSanitizer<'a> {
    selectors: &'a Selectors,
    timing: &'a Timing,
}

impl<'a> ContentSanitizer<'a> {
    pub fn new(selectors: &'a Selectors, timing: &'a Timing) -> Self {
        Self { selectors, timing }
    }

    /// Noise selectors, scoped to the content region.
    pub fn targets(&self) -> Vec<String> {
        self.selectors
            .noise
            .iter()
            .map(|s| self.selectors.in_content(s))
            .collect()
    }

    /// Strip noise from the content region, retrying up to the configured
    /// attempt count.
    #[tracing::instrument(skip_all)]
    pub async fn sanitize(&self, driver: &mut dyn PageDriver) -> Result<SanitizeReport> {
        let targets = self.targets();
        let max_attempts = self.timing.sanitize_attempts.max(1);
        let pause = Duration::from_millis(self.timing.sanitize_interval_ms);

        for attempt in 1..=max_attempts {
            let removed = driver.remove_elements(&targets).await?;
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            if !any_present(driver, &targets).await? {
                tracing::debug!(attempt, removed, "content region clean");
                return Ok(SanitizeReport {
                    attempts: attempt,
                    clean: true,
                });
            }
        }

        tracing::warn!(
            attempts = max_attempts,
            "interactive elements persisted after sanitizing; artifact may contain residue"
        );
        Ok(SanitizeReport {
            attempts: max_attempts,
            clean: false,
        })
    }

    /// Remove the header and footer, which carry the signed-in user's
    /// identity, and wait for them to detach. `false` if detachment could
    /// not be confirmed in time.
    pub async fn remove_chrome(&self, driver: &mut dyn PageDriver) -> Result<bool> {
        let chrome = &self.selectors.privacy_chrome;
        driver.remove_elements(chrome).await?;
        let gone = wait_for(driver, Readiness::Absent(chrome), &self.timing.chrome_removal).await?;
        if !gone {
            tracing::warn!(?chrome, "page chrome still attached after removal");
        }
        Ok(gone)
    }
}

async fn any_present(driver: &dyn PageDriver, selectors: &[String]) -> Result<bool> {
    for selector in selectors {
        if driver.exists(selector).await? {
            return Ok(true);
        }
    }
    Ok(false)
}
