//! Page to document conversion
//!
//! Builds the text and the store's hierarchical processing rule for a page in
//! a given [`ProcessingMode`].

use crate::mode::ProcessingMode;
use crate::store::NewDocument;
use crate::url::DocumentName;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

/// Paragraphs shorter than this are merged into the next one
const MIN_PARAGRAPH_CHARS: usize = 200;

/// Parent chunk size, in tokens, per mode
const FULL_DOC_PARENT_TOKENS: usize = 4_000;
const PARAGRAPH_PARENT_TOKENS: usize = 1_000;

const FULL_DOC_CHILD_TOKENS: usize = 512;
const PARAGRAPH_CHILD_TOKENS: usize = 256;

/// Two or more line breaks with only whitespace between them
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n[ \t]*(\n[ \t]*)+").expect("BLANK_RUNS: hardcoded regex is valid")
});

/// Builds the document to create for a page
pub fn build_document(
    name: &DocumentName,
    url: &str,
    content: &str,
    mode: ProcessingMode,
) -> NewDocument {
    let body = match mode {
        ProcessingMode::FullDoc => collapse_blank_lines(content),
        ProcessingMode::Paragraph => merge_paragraphs(content, MIN_PARAGRAPH_CHARS).join("\n\n"),
    };

    let text = format!(
        "# {}\n\nSource: {}\n\n{}\n",
        name.display_title(),
        url,
        body.trim()
    );

    NewDocument {
        name: name.key().to_string(),
        text,
        process_rule: process_rule(mode),
    }
}

/// Hierarchical chunking rule for the store
///
/// `full-doc` keeps the page as one parent chunk; `paragraph` makes each
/// paragraph a parent. Both split children on single newlines.
pub fn process_rule(mode: ProcessingMode) -> Value {
    let (parent_mode, parent_tokens, child_tokens) = match mode {
        ProcessingMode::FullDoc => ("full-doc", FULL_DOC_PARENT_TOKENS, FULL_DOC_CHILD_TOKENS),
        ProcessingMode::Paragraph => (
            "paragraph",
            PARAGRAPH_PARENT_TOKENS,
            PARAGRAPH_CHILD_TOKENS,
        ),
    };

    json!({
        "mode": "hierarchical",
        "rules": {
            "pre_processing_rules": [
                {"id": "remove_extra_spaces", "enabled": true},
                {"id": "remove_urls_emails", "enabled": false}
            ],
            "segmentation": {"separator": "\n\n", "max_tokens": parent_tokens},
            "parent_mode": parent_mode,
            "subchunk_segmentation": {"separator": "\n", "max_tokens": child_tokens}
        }
    })
}

fn collapse_blank_lines(content: &str) -> String {
    BLANK_RUNS.replace_all(content, "\n\n").into_owned()
}

/// Splits on blank lines and merges short neighbours
///
/// Headings stick to the paragraph that follows them.
pub fn merge_paragraphs(content: &str, min_chars: usize) -> Vec<String> {
    let collapsed = collapse_blank_lines(content);
    let mut merged: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in collapsed.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);

        let is_heading = paragraph.starts_with('#') && !paragraph.contains('\n');
        if current.chars().count() >= min_chars && !is_heading {
            merged.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        match merged.last_mut() {
            // a short tail joins the previous chunk
            Some(last) if current.chars().count() < min_chars => {
                last.push_str("\n\n");
                last.push_str(&current);
            }
            _ => merged.push(current),
        }
    }
    merged
}
