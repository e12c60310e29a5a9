//! Text normalizer
//!
//! Repairs the usual transcription damage in a question's text: placeholder
//! parts, run-together words, missing spaces after numbers, whitespace.
//! Pure function, no state.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// `(b) None` / `(c): None` emitted for unused part slots
static PLACEHOLDER_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\n?[ \t]*\([a-z]\)[ \t]*:?[ \t]*None\b[ \t]*").expect("valid regex")
});
static PLACEHOLDER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*None[ \t]*$").expect("valid regex"));
static SENTENCE_JOIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])([A-Z])").expect("valid regex"));
static CAMEL_JOIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));
static CURRENCY_JOIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\$\d+\.?\d*)([a-zA-Z])").expect("valid regex"));
static SYMBOL_JOIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[¢%])([a-zA-Z])").expect("valid regex"));
static NUMBER_WORD_JOIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)([a-zA-Z]{2,})").expect("valid regex"));
static LATER_PART_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\([b-z]\)").expect("valid regex"));
static LEADING_FIRST_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*\(a\)\s*").expect("valid regex"));
static HORIZONTAL_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static VERTICAL_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

const ORDINAL_SUFFIXES: [&str; 4] = ["st", "nd", "rd", "th"];

/// Clean transcribed question text
///
/// # Arguments
/// * `text` - raw text
/// * `has_subparts` - whether the question is known to have parts; `None`
///   auto-detects from `(b)`, `(c)`, ... markers
///
/// # Returns
/// The cleaned text. Applying it again returns the same text.
pub fn normalize_text(text: &str, has_subparts: Option<bool>) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let text = PLACEHOLDER_PART.replace_all(text, "");
    let text = PLACEHOLDER_LINE.replace_all(&text, "");
    let text = SENTENCE_JOIN.replace_all(&text, "$1 $2");
    let text = CAMEL_JOIN.replace_all(&text, "$1 $2");
    let text = CURRENCY_JOIN.replace_all(&text, "$1 $2");
    let text = SYMBOL_JOIN.replace_all(&text, "$1 $2");
    let text = NUMBER_WORD_JOIN.replace_all(&text, |caps: &Captures| {
        let word = &caps[2];
        if word.len() == 2 && ORDINAL_SUFFIXES.contains(&word.to_ascii_lowercase().as_str()) {
            format!("{}{}", &caps[1], word)
        } else {
            format!("{} {}", &caps[1], word)
        }
    });

    let has_subparts = has_subparts.unwrap_or_else(|| LATER_PART_MARKER.is_match(&text));
    let text = if has_subparts {
        text
    } else {
        LEADING_FIRST_PART.replace(&text, "")
    };

    let text = HORIZONTAL_RUN.replace_all(&text, " ");
    let text = text
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    let text = VERTICAL_RUN.replace_all(&text, "\n\n");

    text.trim().to_string()
}

/// True when the value is a null/placeholder token (`None`, `N/A`, empty)
pub fn is_placeholder(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "none" | "n/a" | "null"
    )
}
