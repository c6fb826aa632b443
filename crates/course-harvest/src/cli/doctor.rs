// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use anyhow::Result;
use course_harvest::config::resolve_config_path;
use course_harvest::driver::chromium::find_chromium;
use course_harvest::session::{read_cookie_jar, Credentials};
use course_harvest::HarvestConfig;
use std::path::Path;

/// Check Chromium availability, configuration and the saved session.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    println!("Course Harvest Doctor");
    println!("=====================");
    println!();

    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    // Configuration
    let resolved = config_path
        .map(Path::to_path_buf)
        .or_else(resolve_config_path);
    let config = match &resolved {
        Some(path) => match HarvestConfig::from_file(path) {
            Ok(config) => {
                println!("[OK] Config loaded: {}", path.display());
                Some(config)
            }
            Err(e) => {
                println!("[!!] Config unreadable: {e:#}");
                None
            }
        },
        None => {
            println!("[OK] No config file; using defaults");
            Some(HarvestConfig::default())
        }
    };

    // Chromium
    let chromium = config
        .as_ref()
        .and_then(|c| c.chromium_path.clone())
        .filter(|p| p.exists())
        .or_else(find_chromium);
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome/Chromium or set HARVEST_CHROMIUM_PATH."
        ),
    }

    if let Some(config) = &config {
        match config.base() {
            Ok(url) => println!("[OK] Portal: {url}"),
            Err(e) => println!("[!!] {e:#}"),
        }

        let jar = &config.cookie_file;
        if !jar.exists() {
            println!("[??] No saved session at {}; you will be asked to log in", jar.display());
        } else {
            match read_cookie_jar(jar) {
                Ok(cookies) => println!(
                    "[OK] Saved session: {} cookie(s) in {}",
                    cookies.len(),
                    jar.display()
                ),
                Err(e) => println!("[!!] Saved session unreadable (will re-login): {e:#}"),
            }
        }
        println!("[OK] Output directory: {}", config.output_dir.display());
    }

    if Credentials::from_env().is_some() {
        println!("[OK] Credentials provided via HARVEST_USERNAME/HARVEST_PASSWORD");
    } else {
        println!("[??] No credentials in environment; login will prompt");
    }

    println!();
    let ready = chromium.is_some() && config.is_some();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
