// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Course Harvest: extracts course material from a learning-management
//! portal into a plain on-disk tree of Markdown, screenshots, downloads and
//! link records.
//!
//! One browser tab is driven strictly sequentially through [`driver::PageDriver`].
//! [`pipeline::Harvester`] sequences courses; per resource,
//! [`download::ResourceDownloader`] dispatches on kind, and quizzes go through
//! [`quiz::QuizQuestionWalker`].

pub mod catalog;
pub mod config;
pub mod download;
pub mod driver;
pub mod error;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod prompt;
pub mod quiz;
pub mod sanitize;
pub mod session;
pub mod wait;

pub use config::HarvestConfig;
pub use error::{HarvestError, HarvestResult};
pub use pipeline::{Harvester, RunSummary};
