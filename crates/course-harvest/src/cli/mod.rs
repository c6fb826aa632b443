// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the harvest binary.

pub mod courses_cmd;
pub mod doctor;
pub mod output;
pub mod run_cmd;

use anyhow::Result;
use clap::Args;
use course_harvest::HarvestConfig;
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Root of the output tree
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Cookie jar file
    #[arg(long)]
    pub cookies: Option<PathBuf>,

    /// Portal base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Course to process without prompting (substring match). Can be repeated.
    #[arg(long = "course")]
    pub courses: Vec<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut HarvestConfig) {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(cookies) = &self.cookies {
            config.cookie_file = cookies.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if self.headful {
            config.headless = false;
        }
        if !self.courses.is_empty() {
            config.courses = self.courses.clone();
        }
    }
}

/// Resolve the config file and apply command-line overrides.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<HarvestConfig> {
    let mut config = HarvestConfig::load(path)?;
    overrides.apply(&mut config);
    config.base()?;
    Ok(config)
}
