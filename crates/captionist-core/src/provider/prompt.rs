//! Prompt construction and free-text reply parsing.
//!
//! Any backend that answers with free text is asked for two labelled lines,
//! `CONCISE:` and `CREATIVE:`. The parser and its fallback are shared by all
//! such backends so they stay interchangeable.

use crate::types::{CaptionPair, CONCISE_MAX_CHARS, CREATIVE_MAX_CHARS};

/// Labels included in the prompt.
const PROMPT_LABELS: usize = 5;

/// Words kept by [`make_concise`].
const CONCISE_MAX_WORDS: usize = 10;

/// Labels mentioned by [`make_creative`].
const CREATIVE_LABELS: usize = 3;

const CONCISE_PREFIX: &str = "CONCISE:";
const CREATIVE_PREFIX: &str = "CREATIVE:";

/// Build the captioning prompt, optionally mentioning detected labels.
pub fn build_prompt(labels: &[String]) -> String {
    let mut prompt = String::from(
        "Generate two image captions:\n\
         1. A concise caption (maximum 10 words) that describes the main subject\n\
         2. A creative caption (1-2 sentences) that tells a story or adds context\n\n",
    );

    if !labels.is_empty() {
        let shown: Vec<&str> = labels
            .iter()
            .take(PROMPT_LABELS)
            .map(String::as_str)
            .collect();
        prompt.push_str(&format!(
            "Detected objects/scenes: {}\n\n",
            shown.join(", ")
        ));
    }

    prompt.push_str(
        "Format your response as:\n\
         CONCISE: [your concise caption here]\n\
         CREATIVE: [your creative caption here]",
    );
    prompt
}

/// Split a model reply into concise and creative captions.
///
/// Lines starting with `CONCISE:` / `CREATIVE:` (any case) supply the values;
/// a later line overrides an earlier one. If either is missing, the trimmed
/// reply is split on its first newline: the first part (max 80 chars) becomes
/// the concise caption and the rest (max 200 chars) the creative one. A
/// single-line reply supplies the creative caption from the full text.
pub fn parse_response(response_text: &str) -> CaptionPair {
    let mut concise = String::new();
    let mut creative = String::new();

    let trimmed = response_text.trim();
    for line in trimmed.split('\n') {
        let line = line.trim();
        if let Some(value) = strip_label(line, CONCISE_PREFIX) {
            concise = value.to_string();
        } else if let Some(value) = strip_label(line, CREATIVE_PREFIX) {
            creative = value.to_string();
        }
    }

    if concise.is_empty() || creative.is_empty() {
        match trimmed.split_once('\n') {
            Some((first, rest)) => {
                concise = truncate_chars(first, CONCISE_MAX_CHARS);
                creative = truncate_chars(rest, CREATIVE_MAX_CHARS);
            }
            None => {
                concise = truncate_chars(trimmed, CONCISE_MAX_CHARS);
                creative = truncate_chars(response_text, CREATIVE_MAX_CHARS);
            }
        }
    }

    CaptionPair { concise, creative }
}

/// Case-insensitive prefix match returning the trimmed remainder.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        Some(line[label.len()..].trim())
    } else {
        None
    }
}

/// Keep at most `max` characters (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Shorten a caption to its first ten words.
pub fn make_concise(caption: &str) -> String {
    let words: Vec<&str> = caption.split_whitespace().collect();
    if words.len() <= CONCISE_MAX_WORDS {
        caption.to_string()
    } else {
        words[..CONCISE_MAX_WORDS].join(" ")
    }
}

/// Extend a plain caption with the leading labels, capped at 200 chars.
pub fn make_creative(base_caption: &str, labels: &[String]) -> String {
    let creative = if labels.is_empty() {
        base_caption.to_string()
    } else {
        let context: Vec<&str> = labels
            .iter()
            .take(CREATIVE_LABELS)
            .map(String::as_str)
            .collect();
        format!("{base_caption}. The scene includes {}.", context.join(", "))
    };
    truncate_chars(&creative, CREATIVE_MAX_CHARS)
}
