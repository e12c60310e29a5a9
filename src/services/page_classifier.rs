//! Page classifier
//!
//! Decides a page's role from its plain-text hint and position. Textual
//! evidence always outranks position; a page with blank answer lines is never
//! an answer key.

use phf::phf_set;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::document::PageSignal;
use crate::models::section::PageRole;

/// Explicit answer-key header phrases (matched against lowercased text)
static ANSWER_KEY_HEADERS: phf::Set<&'static str> = phf_set! {
    "answer key",
    "marking scheme",
    "suggested answers",
    "model answer",
    "mark scheme",
};

/// A line ending in an underscore run, optionally after `Ans:` and a part letter
static BLANK_ANSWER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(?:\bans(?:wer)?[ \t]*:[ \t]*)?(?:\([ \t]*[a-z][ \t]*\)[ \t]*)?_{3,}[ \t]*$")
        .expect("valid regex")
});
static LEADING_MCQ_PAIRS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Q\s*1[:\s]+[ABCD]\s+Q\s*2[:\s]+[ABCD]").expect("valid regex")
});
static QNUM_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Q\s*\d+\s*[:\s]+(?:[ABCD]|\$?\d)").expect("valid regex")
});
static WORKED_EQUALITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*[+\-×÷x]\s*\d+\s*=\s*\d+").expect("valid regex"));
static QNUM_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Q\s*\d+\s*\([a-z]\)").expect("valid regex"));
static EARLY_QNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:Q|Question)\s*(?:[1-9]|10)\b").expect("valid regex"));
static OPTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\([A-D]\)|^[A-D]\s*[:.]").expect("valid regex"));
static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+\s*[.)]\s*\w").expect("valid regex"));

/// Thresholds for the dense-run checks
const MIN_QNUM_VALUE_PAIRS: usize = 5;
const MIN_WORKED_EQUALITIES: usize = 6;
const MIN_QNUM_PARTS: usize = 4;
const MIN_OPTION_MARKERS: usize = 4;
/// Cover/blank page detection
const COVER_MAX_HINT_CHARS: usize = 50;
const COVER_MAX_PAGE: u32 = 2;

/// Classify one page
///
/// # Arguments
/// * `page_number` - 1-based page number
/// * `total_pages` - page count of the document
/// * `text_hint` - plain text extracted from the page, may be empty
pub fn classify_page(page_number: u32, total_pages: u32, text_hint: &str) -> PageRole {
    let role = classify(page_number, total_pages, text_hint);
    debug!("[page {}/{}] classified as {}", page_number, total_pages, role);
    role
}

/// Classify one page into the signal the extraction steps consume
pub fn page_signal(page_number: u32, total_pages: u32, text_hint: &str) -> PageSignal {
    PageSignal {
        page_number,
        text_hint: text_hint.to_string(),
        role: classify_page(page_number, total_pages, text_hint),
    }
}

fn classify(page_number: u32, total_pages: u32, text: &str) -> PageRole {
    if is_cover_page(page_number, text) {
        return PageRole::Skip;
    }

    let lower = text.to_lowercase();
    let ratio = position_ratio(page_number, total_pages);

    // Blank answer lines: a question page wherever it sits
    if BLANK_ANSWER_LINE.is_match(&lower) {
        return section_from_headers(&lower).unwrap_or_else(|| role_by_position(ratio));
    }

    if looks_like_answer_key(text, &lower) {
        return PageRole::AnswerKey;
    }

    if lower.contains("booklet a") || lower.contains("questions 1 to 10") {
        return PageRole::Mcq;
    }
    if lower.contains("booklet b")
        || lower.contains("questions 16 to")
        || lower.contains("questions 11 to")
    {
        return PageRole::ShortAnswer;
    }
    if lower.contains("paper 2") && !lower.contains("answer") {
        return PageRole::LongAnswer;
    }

    if EARLY_QNUM.is_match(text) && OPTION_MARKER.find_iter(text).count() >= MIN_OPTION_MARKERS {
        return PageRole::Mcq;
    }

    let has_question_numbers = NUMBERED_LINE.is_match(text);
    let length = text.chars().count();
    if has_question_numbers && length > 500 && ratio >= 0.5 {
        return PageRole::LongAnswer;
    }

    // Last resort: only the final 10% may default to answer key
    if ratio >= 0.9 {
        if length > 800 && has_question_numbers {
            return PageRole::LongAnswer;
        }
        return PageRole::AnswerKey;
    }
    role_by_position(ratio)
}

/// Short hint text on the first pages
pub fn is_cover_page(page_number: u32, text_hint: &str) -> bool {
    page_number <= COVER_MAX_PAGE && text_hint.trim().chars().count() < COVER_MAX_HINT_CHARS
}

/// Explicit headers and dense answer runs
fn looks_like_answer_key(text: &str, lower: &str) -> bool {
    if ANSWER_KEY_HEADERS.iter().any(|marker| lower.contains(marker)) {
        return true;
    }
    LEADING_MCQ_PAIRS.is_match(text)
        || QNUM_VALUE.find_iter(text).count() >= MIN_QNUM_VALUE_PAIRS
        || WORKED_EQUALITY.find_iter(text).count() >= MIN_WORKED_EQUALITIES
        || QNUM_PART.find_iter(text).count() >= MIN_QNUM_PARTS
}

/// Section markers that decide a known question page's role
fn section_from_headers(lower: &str) -> Option<PageRole> {
    if lower.contains("paper 2") {
        Some(PageRole::LongAnswer)
    } else if lower.contains("booklet b") {
        Some(PageRole::ShortAnswer)
    } else if lower.contains("booklet a") {
        Some(PageRole::Mcq)
    } else {
        None
    }
}

fn position_ratio(page_number: u32, total_pages: u32) -> f64 {
    page_number as f64 / total_pages.max(1) as f64
}

fn role_by_position(ratio: f64) -> PageRole {
    if ratio < 0.25 {
        PageRole::Mcq
    } else if ratio < 0.5 {
        PageRole::ShortAnswer
    } else {
        PageRole::LongAnswer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(text: &str) -> String {
        format!("{}\n{}", text, "Read each question carefully and show all working. ".repeat(2))
    }

    #[test]
    fn test_page_signal_carries_role() {
        let hint = padded("Paper 2\n1. Find the area of the figure.\nAns: ________");
        let signal = page_signal(14, 20, &hint);
        assert_eq!(signal.page_number, 14);
        assert_eq!(signal.role, PageRole::LongAnswer);
        assert_eq!(signal.text_hint, hint);

        assert_eq!(page_signal(1, 20, "PRELIM 2025").role, PageRole::Skip);
    }

    #[test]
    fn test_cover_page_is_skipped() {
        assert_eq!(classify_page(1, 20, "PRELIM 2025"), PageRole::Skip);
        assert_eq!(classify_page(2, 20, ""), PageRole::Skip);
        // short text later in the paper is not a cover
        assert_ne!(classify_page(5, 20, ""), PageRole::Skip);
    }

    #[test]
    fn test_answer_key_header() {
        let text = padded("ANSWER KEY\nPaper 1");
        assert_eq!(classify_page(18, 20, &text), PageRole::AnswerKey);
    }

    #[test]
    fn test_dense_mcq_answers() {
        let text = padded("Q1 A Q2 C Q3 D Q4 B Q5 A Q6 C");
        assert_eq!(classify_page(10, 20, &text), PageRole::AnswerKey);
    }

    #[test]
    fn test_blank_answer_line_beats_dense_answers() {
        let text = padded(
            "Booklet B\nQ1: A shop sold Q2: B items Q3: C Q4: D Q5: A\n21. Find the total.\nAns: ________",
        );
        assert_eq!(classify_page(12, 20, &text), PageRole::ShortAnswer);
    }

    #[test]
    fn test_blank_answer_line_beats_answer_key_header() {
        let text = padded("Show your working. Model answer space below.\nAns: (a) ______");
        // no section header: position decides
        assert_eq!(classify_page(19, 20, &text), PageRole::LongAnswer);
    }

    #[test]
    fn test_worked_equalities() {
        let text = padded("3 x 4 = 12\n12 + 8 = 20\n20 - 5 = 15\n15 ÷ 3 = 5\n5 x 9 = 45\n45 + 5 = 50");
        assert_eq!(classify_page(15, 20, &text), PageRole::AnswerKey);
    }

    #[test]
    fn test_section_headers() {
        assert_eq!(
            classify_page(3, 20, &padded("Booklet A\nQuestions 1 to 10 carry 1 mark each")),
            PageRole::Mcq
        );
        assert_eq!(
            classify_page(3, 20, &padded("Questions 16 to 30 carry 2 marks each")),
            PageRole::ShortAnswer
        );
        assert_eq!(
            classify_page(3, 20, &padded("Paper 2\nShow your working clearly")),
            PageRole::LongAnswer
        );
    }

    #[test]
    fn test_mcq_by_options() {
        let text = padded("Question 3\nWhich is the largest?\n(A) 0.5\n(B) 0.05\n(C) 5.0\n(D) 0.55");
        assert_eq!(classify_page(9, 20, &text), PageRole::Mcq);
    }

    #[test]
    fn test_long_text_in_back_half() {
        let body = "6. Mrs Tan bought some apples and pears for her class party. ".repeat(10);
        assert_eq!(classify_page(12, 20, &body), PageRole::LongAnswer);
    }

    #[test]
    fn test_position_fallback() {
        let text = padded("Some page text without markers");
        assert_eq!(classify_page(3, 20, &text), PageRole::Mcq);
        assert_eq!(classify_page(7, 20, &text), PageRole::ShortAnswer);
        assert_eq!(classify_page(12, 20, &text), PageRole::LongAnswer);
        assert_eq!(classify_page(19, 20, &text), PageRole::AnswerKey);
    }

    #[test]
    fn test_zero_total_pages() {
        let text = padded("Some page text without markers");
        assert_eq!(classify_page(3, 0, &text), PageRole::AnswerKey);
    }
}
