// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Readiness predicates with a bounded poll-with-timeout.
//!
//! Every suspension point in the pipeline (post-login, post-submit,
//! post-removal, post-click) waits on an explicit predicate instead of a
//! fixed sleep. A wait that runs out of time reports `false`; callers decide
//! whether that is tolerable.

use crate::driver::PageDriver;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Poll interval and overall bound for one kind of wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl WaitPolicy {
    pub const fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval_ms,
            timeout_ms,
        }
    }

    /// A policy that checks exactly once and never sleeps.
    pub const fn immediate() -> Self {
        Self::new(0, 0)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Number of sleeps between the first and last check.
    pub fn rounds(&self) -> u64 {
        if self.interval_ms == 0 {
            return 0;
        }
        self.timeout_ms.div_ceil(self.interval_ms)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(250, 5_000)
    }
}

/// A condition on the current page.
#[derive(Debug, Clone, Copy)]
pub enum Readiness<'a> {
    /// At least one element matches the selector.
    Present(&'a str),
    /// None of the selectors match anything.
    Absent(&'a [String]),
}

impl Readiness<'_> {
    async fn holds(&self, driver: &mut dyn PageDriver) -> Result<bool> {
        match self {
            Readiness::Present(selector) => driver.exists(selector).await,
            Readiness::Absent(selectors) => {
                for selector in selectors.iter() {
                    if driver.exists(selector).await? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

/// Poll `readiness` until it holds or the policy's bound is exhausted.
///
/// Returns `Ok(false)` on timeout. A driver error on an intermediate check
/// (a page mid-navigation) is retried; one on the final check propagates.
pub async fn wait_for(
    driver: &mut dyn PageDriver,
    readiness: Readiness<'_>,
    policy: &WaitPolicy,
) -> Result<bool> {
    let mut last_error = None;
    for round in 0..=policy.rounds() {
        if round > 0 {
            tokio::time::sleep(policy.interval()).await;
        }
        match readiness.holds(driver).await {
            Ok(true) => return Ok(true),
            Ok(false) => last_error = None,
            Err(e) => {
                tracing::debug!(?readiness, "readiness check failed: {e}");
                last_error = Some(e);
            }
        }
    }
    if let Some(e) = last_error {
        return Err(e);
    }
    tracing::debug!(?readiness, timeout_ms = policy.timeout_ms, "readiness wait timed out");
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::MemoryDriver;

    #[test]
    fn rounds_cover_the_timeout() {
        assert_eq!(WaitPolicy::new(100, 3_000).rounds(), 30);
        assert_eq!(WaitPolicy::new(400, 1_000).rounds(), 3);
        assert_eq!(WaitPolicy::immediate().rounds(), 0);
        assert_eq!(WaitPolicy::new(0, 5_000).rounds(), 0);
    }

    #[tokio::test]
    async fn present_and_absent_on_static_page() {
        let mut driver = MemoryDriver::new();
        driver.add_page(
            "https://portal.example/",
            "<html><body><nav class='navbar'>me</nav><p>x</p></body></html>",
        );
        driver.navigate("https://portal.example/").await.unwrap();

        let policy = WaitPolicy::new(1, 3);
        assert!(wait_for(&mut driver, Readiness::Present(".navbar"), &policy)
            .await
            .unwrap());
        let gone = vec![".navbar".to_string()];
        assert!(!wait_for(&mut driver, Readiness::Absent(&gone), &policy)
            .await
            .unwrap());
        let never = vec!["footer".to_string()];
        assert!(wait_for(&mut driver, Readiness::Absent(&never), &policy)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn persistent_driver_error_propagates() {
        let mut driver = MemoryDriver::new();
        driver.add_page("https://portal.example/", "<p>x</p>");
        driver.navigate("https://portal.example/").await.unwrap();

        let result = wait_for(
            &mut driver,
            Readiness::Present("[[broken"),
            &WaitPolicy::new(1, 2),
        )
        .await;
        assert!(result.is_err());
    }
}
