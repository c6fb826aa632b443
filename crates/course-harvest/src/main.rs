// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

mod cli;

use cli::Overrides;

#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Course Harvest - extract course material from a learning portal",
    version,
    after_help = "Run 'harvest <command> --help' for details on each command.\nRun 'harvest' with no command to start a harvest."
)]
struct Cli {
    /// Path to a JSON config file (default: $HARVEST_CONFIG, ./harvest.json, ~/.course-harvest/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Suppress progress output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, pick courses and resources, and extract them
    Run {
        #[command(flatten)]
        overrides: Overrides,
        /// Select every course and resource without prompting
        #[arg(long)]
        all: bool,
    },
    /// List the courses on the portal home
    Courses {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.quiet {
        std::env::set_var("HARVEST_QUIET", "1");
    }

    let default_level = if cli.verbose {
        "course_harvest=debug"
    } else {
        "course_harvest=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        None => cli::run_cmd::run(config_path, &Overrides::default(), false).await,
        Some(Commands::Run { overrides, all }) => {
            cli::run_cmd::run(config_path, &overrides, all).await
        }
        Some(Commands::Courses { overrides }) => cli::courses_cmd::run(config_path, &overrides).await,
        Some(Commands::Doctor) => cli::doctor::run(config_path).await,
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "harvest", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
