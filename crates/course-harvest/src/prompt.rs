// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Operator prompts: checklists over grouped choices, and credential entry.
//!
//! Prompts are synchronous and only the orchestrator calls them.

use crate::session::Credentials;
use anyhow::{bail, Result};
use rustyline::completion::{Completer, Pair};
use rustyline::config::{ColorMode, Configurer};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};
use std::borrow::Cow;
use std::collections::VecDeque;

/// A titled group of labeled choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceGroup {
    pub title: String,
    pub labels: Vec<String>,
}

impl ChoiceGroup {
    pub fn new(title: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            title: title.into(),
            labels,
        }
    }
}

/// Source of operator decisions.
pub trait Prompter {
    /// Pick from `groups`. Returns indices into the concatenation of every
    /// group's labels, ascending. Empty means "nothing".
    fn select(&mut self, title: &str, groups: &[ChoiceGroup]) -> Result<Vec<usize>>;

    fn credentials(&mut self) -> Result<Credentials>;
}

/// Parse a selection answer over `count` choices numbered from 1.
///
/// Accepts `all`, an empty answer, or numbers and ranges separated by spaces
/// or commas (`1 3 5-7`).
pub fn parse_selection(input: &str, count: usize) -> Result<Vec<usize>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }
    if input.eq_ignore_ascii_case("all") || input == "*" {
        return Ok((0..count).collect());
    }

    let mut picked = Vec::new();
    for token in input.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() {
            continue;
        }
        let (lo, hi) = match token.split_once('-') {
            Some((a, b)) => (parse_index(a, count)?, parse_index(b, count)?),
            None => {
                let n = parse_index(token, count)?;
                (n, n)
            }
        };
        if lo > hi {
            bail!("range {token} runs backwards");
        }
        picked.extend(lo..=hi);
    }
    picked.sort_unstable();
    picked.dedup();
    Ok(picked)
}

fn parse_index(token: &str, count: usize) -> Result<usize> {
    let Ok(n) = token.trim().parse::<usize>() else {
        bail!("{token:?} is not a number");
    };
    if n == 0 || n > count {
        bail!("{n} is out of range 1-{count}");
    }
    Ok(n - 1)
}

/// Line-editor helper: completes `all` and masks input while reading a password.
#[derive(Default)]
struct PromptHelper {
    masking: bool,
}

impl Completer for PromptHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        if self.masking {
            return Ok((pos, Vec::new()));
        }
        let input = &line[..pos];
        if !input.is_empty() && "all".starts_with(input) {
            return Ok((
                0,
                vec![Pair {
                    display: "all".to_string(),
                    replacement: "all".to_string(),
                }],
            ));
        }
        Ok((pos, Vec::new()))
    }
}

impl Hinter for PromptHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if self.masking || pos < line.len() || line.is_empty() {
            return None;
        }
        "all"
            .strip_prefix(line)
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
    }
}

impl Highlighter for PromptHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if self.masking {
            Cow::Owned("*".repeat(line.chars().count()))
        } else {
            Cow::Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        self.masking
    }
}

impl Validator for PromptHelper {}
impl Helper for PromptHelper {}

/// Prompts on the controlling terminal.
pub struct TerminalPrompter {
    editor: Editor<PromptHelper, rustyline::history::DefaultHistory>,
}

impl TerminalPrompter {
    pub fn new() -> Result<Self> {
        let config = Config::builder().auto_add_history(false).build();
        let mut editor: Editor<PromptHelper, rustyline::history::DefaultHistory> =
            Editor::with_config(config)?;
        editor.set_helper(Some(PromptHelper::default()));
        editor.set_color_mode(ColorMode::Forced);
        Ok(Self { editor })
    }

    fn set_masking(&mut self, masking: bool) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.masking = masking;
        }
    }

    fn read(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Interrupted) => bail!("cancelled"),
            Err(e) => Err(e.into()),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn select(&mut self, title: &str, groups: &[ChoiceGroup]) -> Result<Vec<usize>> {
        let count: usize = groups.iter().map(|g| g.labels.len()).sum();
        if count == 0 {
            return Ok(Vec::new());
        }

        eprintln!();
        eprintln!("  \x1b[1m{title}\x1b[0m");
        let mut n = 0;
        for group in groups {
            if !group.title.is_empty() {
                eprintln!("  \x1b[36m{}\x1b[0m", group.title);
            }
            for label in &group.labels {
                n += 1;
                eprintln!("    \x1b[90m{n:>3}\x1b[0m  {label}");
            }
        }
        eprintln!();
        eprintln!("  \x1b[90mNumbers or ranges (1 3 5-7), `all`, or Enter for none.\x1b[0m");

        self.set_masking(false);
        loop {
            let Some(answer) = self.read("  select> ")? else {
                return Ok(Vec::new());
            };
            match parse_selection(&answer, count) {
                Ok(picked) => return Ok(picked),
                Err(e) => eprintln!("  \x1b[33m!\x1b[0m {e}"),
            }
        }
    }

    fn credentials(&mut self) -> Result<Credentials> {
        self.set_masking(false);
        let username = self.read("  Username: ")?.unwrap_or_default();
        self.set_masking(true);
        let password = self.read("  Password: ");
        self.set_masking(false);
        let password = password?.unwrap_or_default();
        Ok(Credentials {
            username: username.trim().to_string(),
            password,
        })
    }
}

/// Replays canned answers; used by tests and non-interactive runs.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    credentials: Option<Credentials>,
    /// Titles of every `select` call, in order.
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    /// Each answer is parsed like terminal input; when answers run out,
    /// everything is selected.
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&mut self, title: &str, groups: &[ChoiceGroup]) -> Result<Vec<usize>> {
        self.asked.push(title.to_string());
        let count = groups.iter().map(|g| g.labels.len()).sum();
        let answer = self.answers.pop_front().unwrap_or_else(|| "all".to_string());
        parse_selection(&answer, count)
    }

    fn credentials(&mut self) -> Result<Credentials> {
        match &self.credentials {
            Some(c) => Ok(c.clone()),
            None => bail!("no credentials available; set HARVEST_USERNAME and HARVEST_PASSWORD"),
        }
    }
}
