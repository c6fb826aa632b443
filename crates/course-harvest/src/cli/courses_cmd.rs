// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! `harvest courses`: list what the portal home links to.

use crate::cli::output::Styled;
use crate::cli::{load_config, Overrides};
use anyhow::Result;
use course_harvest::driver::chromium::ChromiumDriver;
use course_harvest::prompt::TerminalPrompter;
use course_harvest::Harvester;
use std::path::Path;

pub async fn run(config_path: Option<&Path>, overrides: &Overrides) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let s = Styled::new();
    let mut prompter = TerminalPrompter::new()?;
    let mut driver = ChromiumDriver::launch(&config).await?;

    let harvester = Harvester::new(&config);
    let listed = match harvester.authenticate(&mut driver, &mut prompter).await {
        Ok(()) => harvester.list_courses(&mut driver).await,
        Err(e) => Err(e),
    };
    if let Err(e) = driver.shutdown().await {
        tracing::debug!("browser shutdown: {e:#}");
    }
    let courses = listed?;

    if courses.is_empty() {
        eprintln!("  {} No courses listed on {}", s.warn_sym(), config.base_url);
        return Ok(());
    }
    println!("{}", s.bold(&format!("Courses on {}", config.base_url)));
    for (i, course) in courses.iter().enumerate() {
        let selected = config.courses.is_empty()
            || config
                .courses
                .iter()
                .any(|w| course.name.to_lowercase().contains(&w.to_lowercase()));
        let mark = if selected { s.ok_sym() } else { " ".to_string() };
        println!("  {mark} {:>3}  {}  {}", i + 1, course.name, s.dim(&course.url));
    }
    Ok(())
}
