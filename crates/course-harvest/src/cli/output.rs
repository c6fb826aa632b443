// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal output helpers: status symbols, quiet mode, and the progress
//! spinner fed from the pipeline's event channel.

use course_harvest::progress::{ProgressEventKind, ProgressReceiver};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

pub fn is_quiet() -> bool {
    std::env::var("HARVEST_QUIET").is_ok()
}

/// ANSI styling, disabled when stderr is not a terminal or `NO_COLOR` is set.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self {
            color: std::io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn ok_sym(&self) -> String {
        self.paint("32", "\u{2713}")
    }

    pub fn warn_sym(&self) -> String {
        self.paint("33", "!")
    }

    pub fn fail_sym(&self) -> String {
        self.paint("31", "\u{2717}")
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("90", text)
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}

/// A spinner for the current step; completed and failed resources and
/// warnings are printed above it as they happen.
pub fn spinner() -> ProgressBar {
    if is_quiet() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Drain progress events into `bar` until the channel closes.
pub async fn render(mut rx: ProgressReceiver, bar: ProgressBar) {
    let s = Styled::new();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        match event.event {
            ProgressEventKind::CourseStarted { name, .. } => {
                bar.println(format!("  {}", s.bold(&name)));
                bar.set_message(format!("Opening {name}"));
            }
            ProgressEventKind::ResourceStarted {
                section,
                name,
                kind,
            } => {
                bar.set_message(format!("{section} / {name} {}", s.dim(&format!("[{kind}]"))));
            }
            ProgressEventKind::ResourceCompleted { name, kind } => {
                bar.println(format!("    {} {name} {}", s.ok_sym(), s.dim(&format!("[{kind}]"))));
            }
            ProgressEventKind::ResourceFailed { name, kind, reason } => {
                bar.println(format!(
                    "    {} {name} {} {reason}",
                    s.fail_sym(),
                    s.dim(&format!("[{kind}]"))
                ));
            }
            ProgressEventKind::QuestionProcessed {
                quiz,
                number,
                completed,
                partial,
            } => {
                let mut note = String::new();
                if completed {
                    note.push_str(" (answered)");
                }
                if partial {
                    note.push_str(" (partial)");
                }
                bar.set_message(format!("{quiz}: question {number}{}", s.dim(&note)));
            }
            ProgressEventKind::QuizSkipped { name, reason } => {
                bar.println(format!("    {} {name}: {reason}", s.warn_sym()));
            }
            ProgressEventKind::Warning { message } => {
                bar.println(format!("    {} {message}", s.warn_sym()));
            }
            ProgressEventKind::RunComplete { .. } => {
                bar.finish_and_clear();
            }
        }
    }
    bar.finish_and_clear();
}
