// Copyright 2026 Course Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTML-to-Markdown conversion for question content.

use anyhow::{Context, Result};
use htmd::options::{BulletListMarker, HeadingStyle, Options};
use htmd::HtmlToMarkdown;

/// Code captured alongside a question's content region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBlocks {
    /// Template restored by the question's reset control.
    pub starter: Option<String>,
    /// Current contents of the answer editor.
    pub saved: Option<String>,
}

fn converter() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style"])
        .options(Options {
            heading_style: HeadingStyle::Atx,
            bullet_list_marker: BulletListMarker::Dash,
            ..Default::default()
        })
        .build()
}

/// Converts a sanitized content region into one Markdown document.
#[derive(Debug, Clone)]
pub struct ContentNormalizer {
    placeholder: String,
    language: String,
}

impl ContentNormalizer {
    /// `placeholder` is the probe program; a saved answer equal to it is
    /// never emitted.
    pub fn new(placeholder: &str, language: &str) -> Self {
        Self {
            placeholder: placeholder.trim().to_string(),
            language: language.to_string(),
        }
    }

    /// Same inputs always produce the same text.
    pub fn normalize(&self, region_html: &str, code: &CodeBlocks) -> Result<String> {
        let mut markdown = converter()
            .convert(region_html)
            .context("failed to convert content region to markdown")?;

        if let Some(starter) = non_empty(code.starter.as_deref()) {
            self.append_block(&mut markdown, "Starter Code", starter);
        }
        if let Some(saved) = non_empty(code.saved.as_deref()) {
            if saved != self.placeholder {
                self.append_block(&mut markdown, "Saved Code", saved);
            }
        }
        Ok(markdown)
    }

    fn append_block(&self, markdown: &mut String, title: &str, code: &str) {
        markdown.push_str(&format!(
            "\n\n## {title}:\n\n```{}\n{code}\n```\n",
            self.language
        ));
    }
}

fn non_empty(code: Option<&str>) -> Option<&str> {
    code.map(str::trim).filter(|c| !c.is_empty())
}
