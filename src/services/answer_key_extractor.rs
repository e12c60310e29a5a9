//! Answer-key extractor
//!
//! Reads an answer-key page transcription into candidate answers. The oracle
//! is asked for a flat JSON object keyed `P1A_1`, `P1B_21a`, `P2_6b`, ...;
//! when no object can be recovered, a line scanner reads `Q<n>[(part)]: value`
//! lines instead.

use phf::phf_map;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::models::answer_key::CandidateAnswer;
use crate::models::section::Section;

static MCQ_DIGITS: phf::Map<char, &'static str> = phf_map! {
    '1' => "A",
    '2' => "B",
    '3' => "C",
    '4' => "D",
};

static MCQ_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:option\s*)?[(\[]?\s*([1-4a-d])\s*[)\]]?\s*$").expect("valid regex")
});
static PREFIXED_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(P1A|P1B|P2)_(\d+)\s*\(?([a-e])?\)?\s*$").expect("valid regex")
});
static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*Q?\s*(\d+)\s*\(?([a-e])?\)?\s*$").expect("valid regex")
});
static FLAT_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("valid regex"));
static QUESTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Q\s*(\d+)(.*)$").expect("valid regex"));
static PART_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\(([a-e])\)\s*(.+)$").expect("valid regex"));

/// Extract candidate answers from one answer-key page
///
/// # Arguments
/// * `response` - raw oracle text
/// * `page_number` - recorded as the candidates' source page
pub fn extract_answer_key(response: &str, page_number: u32) -> Vec<CandidateAnswer> {
    match recover_json_object(response) {
        Ok(map) => {
            let candidates = candidates_from_map(&map, page_number);
            debug!(
                "[page {}] answer key: {} candidates from JSON",
                page_number,
                candidates.len()
            );
            candidates
        }
        Err(e) => {
            warn!("⚠️ [page {}] {}, falling back to line scan", page_number, e);
            let candidates = parse_answer_lines(response, page_number);
            debug!(
                "[page {}] answer key: {} candidates from lines",
                page_number,
                candidates.len()
            );
            candidates
        }
    }
}

/// Recover a non-empty JSON object from free text
///
/// Tries, in order: the first balanced `{...}`, the whole response, the first
/// brace-free `{...}`.
pub fn recover_json_object(response: &str) -> Result<Map<String, Value>, ParseError> {
    let attempts = [
        balanced_object(response),
        Some(response.trim()),
        FLAT_OBJECT.find(response).map(|m| m.as_str()),
    ];

    let mut non_object = None;
    for candidate in attempts.into_iter().flatten() {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) if !map.is_empty() => return Ok(map),
            Ok(Value::Object(_)) => {}
            Ok(other) => non_object = Some(other),
            Err(_) => {}
        }
    }

    match non_object {
        Some(value) => Err(ParseError::NotAFlatMap {
            reason: format!("top-level value is {}", json_kind(&value)),
        }),
        None => Err(ParseError::NoAnswerObject {
            length: response.len(),
        }),
    }
}

/// MCQ answer to a letter: `3` -> `C`, `(2)` -> `B`, `c` -> `C`
///
/// Anything else is returned unchanged.
pub fn normalize_mcq_answer(answer: &str) -> String {
    let Some(caps) = MCQ_VALUE.captures(answer) else {
        return answer.trim().to_string();
    };
    let symbol = caps[1].chars().next().unwrap_or_default().to_ascii_uppercase();
    match MCQ_DIGITS.get(&symbol) {
        Some(letter) => (*letter).to_string(),
        None => symbol.to_string(),
    }
}

/// Section for an answer with no section prefix or header
pub fn infer_section(number: u32) -> Option<Section> {
    match number {
        1..=15 => Some(Section::P1A),
        16..=30 => Some(Section::P1B),
        _ => None,
    }
}

/// Build a candidate, applying MCQ normalization to Booklet A answers
fn candidate(
    section: Section,
    number: u32,
    part: Option<char>,
    answer: &str,
    working: Option<String>,
    page_number: u32,
) -> CandidateAnswer {
    let answer = if section == Section::P1A {
        normalize_mcq_answer(answer)
    } else {
        answer.trim().to_string()
    };
    CandidateAnswer::new(section, number, part, answer, page_number).with_working(working)
}

fn candidates_from_map(map: &Map<String, Value>, page_number: u32) -> Vec<CandidateAnswer> {
    map.iter()
        .filter_map(|(key, value)| {
            let answer = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => {
                    debug!("[page {}] key {} has a non-scalar value", page_number, key);
                    return None;
                }
            };
            if answer.is_empty() {
                return None;
            }
            let Some((section, number, part)) = parse_key(key) else {
                debug!("[page {}] unrecognised key {}", page_number, key);
                return None;
            };
            Some(candidate(section, number, part, &answer, None, page_number))
        })
        .collect()
}

/// `P2_6b` -> (P2, 6, Some('b')); a bare `21` infers its section from the number
fn parse_key(key: &str) -> Option<(Section, u32, Option<char>)> {
    if let Some(caps) = PREFIXED_KEY.captures(key) {
        let section = Section::from_code(&caps[1])?;
        let number = caps[2].parse().ok()?;
        let part = caps.get(3).and_then(|m| m.as_str().chars().next());
        return Some((section, number, part.map(|c| c.to_ascii_lowercase())));
    }
    let caps = BARE_KEY.captures(key)?;
    let number = caps[1].parse().ok()?;
    let part = caps.get(2).and_then(|m| m.as_str().chars().next());
    Some((infer_section(number)?, number, part.map(|c| c.to_ascii_lowercase())))
}

// ========== Line scanner ==========

/// The answer being accumulated by the line scanner
#[derive(Debug)]
struct Pending {
    number: u32,
    part: Option<char>,
    answer: Option<String>,
    working: Vec<String>,
}

impl Pending {
    fn new(number: u32, part: Option<char>) -> Self {
        Self {
            number,
            part,
            answer: None,
            working: Vec::new(),
        }
    }
}

/// Line-oriented fallback
///
/// Understands section headers, `Q21: value`, `Q21(a) value`, `Q21a: value`,
/// `Working:`/`Answer:` continuation lines and standalone `(b) value` lines.
pub fn parse_answer_lines(response: &str, page_number: u32) -> Vec<CandidateAnswer> {
    let mut out = Vec::new();
    let mut section: Option<Section> = None;
    let mut pending: Option<Pending> = None;

    for line in response.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(caps) = QUESTION_LINE.captures(line) {
            flush(pending.take(), section, page_number, &mut out);
            let Ok(number) = caps[1].parse::<u32>() else {
                continue;
            };
            let (part, rest) = split_part(&caps[2]);
            let mut next = Pending::new(number, part);
            apply_value(&mut next, rest);
            pending = Some(next);
            continue;
        }

        if let Some(header) = section_header(line) {
            flush(pending.take(), section, page_number, &mut out);
            section = Some(header);
            continue;
        }

        let Some(current) = pending.as_mut() else {
            continue;
        };

        if let Some(caps) = PART_LINE.captures(line) {
            let number = current.number;
            let part = caps[1].chars().next().map(|c| c.to_ascii_lowercase());
            let value = caps[2].to_string();
            flush(pending.take(), section, page_number, &mut out);
            let mut next = Pending::new(number, part);
            apply_value(&mut next, &value);
            pending = Some(next);
            continue;
        }

        let lower = line.to_ascii_lowercase();
        if lower.starts_with("answer:") || lower.starts_with("ans:") {
            current.answer = after_colon(line).filter(|a| !a.is_empty());
        } else if lower.starts_with("working:") {
            if let Some(w) = after_colon(line).filter(|w| !is_not_shown(w)) {
                current.working.push(w);
            }
        } else if lower.starts_with("notes:") {
            // marking notes are not part of the answer
        } else if current.answer.is_none() && !line.starts_with('-') {
            current.answer = Some(line.to_string());
        }
    }
    flush(pending.take(), section, page_number, &mut out);
    out
}

/// Leading part marker after `Q<n>`: `(a)`, or a letter glued to the number
fn split_part(rest: &str) -> (Option<char>, &str) {
    let trimmed = rest.trim_start();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'(' && bytes[2] == b')' {
        let letter = (bytes[1] as char).to_ascii_lowercase();
        if ('a'..='e').contains(&letter) {
            return (Some(letter), &trimmed[3..]);
        }
    }
    // `Q21a: 11/12` but not `Q3 B`
    if rest.len() == trimmed.len() && !bytes.is_empty() {
        let letter = (bytes[0] as char).to_ascii_lowercase();
        let glued = bytes.get(1).map_or(true, |b| !b.is_ascii_alphanumeric());
        if ('a'..='e').contains(&letter) && glued {
            return (Some(letter), &trimmed[1..]);
        }
    }
    (None, rest)
}

/// Value on the same line as the question marker
fn apply_value(pending: &mut Pending, rest: &str) {
    let value = rest.trim_start_matches(|c: char| c == ':' || c == '-' || c == '.' || c.is_whitespace());
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("working") {
        if let Some(w) = after_colon(value).filter(|w| !is_not_shown(w)) {
            pending.working.push(w);
        }
    } else if lower.starts_with("answer:") {
        pending.answer = after_colon(value).filter(|a| !a.is_empty());
    } else {
        pending.answer = Some(value.to_string());
    }
}

fn flush(
    pending: Option<Pending>,
    section: Option<Section>,
    page_number: u32,
    out: &mut Vec<CandidateAnswer>,
) {
    let Some(p) = pending else {
        return;
    };
    let Some(answer) = p.answer.filter(|a| !a.trim().is_empty()) else {
        return;
    };
    let Some(section) = section.or_else(|| infer_section(p.number)) else {
        debug!("[page {}] Q{} has no section, dropped", page_number, p.number);
        return;
    };
    let working = (!p.working.is_empty()).then(|| p.working.join("\n"));
    out.push(candidate(section, p.number, p.part, &answer, working, page_number));
}

fn section_header(line: &str) -> Option<Section> {
    let lower = line.to_lowercase();
    if lower.contains("booklet a") || lower.contains("paper 1a") {
        Some(Section::P1A)
    } else if lower.contains("booklet b") || lower.contains("paper 1b") {
        Some(Section::P1B)
    } else if lower.contains("paper 2") {
        Some(Section::P2)
    } else {
        None
    }
}

fn after_colon(line: &str) -> Option<String> {
    line.split_once(':').map(|(_, v)| v.trim().to_string())
}

fn is_not_shown(working: &str) -> bool {
    let w = working.trim().to_ascii_lowercase();
    w.is_empty() || w == "not shown" || w == "none"
}

fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::answer_key::AnswerKey;

    fn keyed(candidates: Vec<CandidateAnswer>) -> AnswerKey {
        let mut key = AnswerKey::new();
        key.extend(candidates);
        key
    }

    #[test]
    fn test_mcq_normalization() {
        assert_eq!(normalize_mcq_answer("3"), "C");
        assert_eq!(normalize_mcq_answer("C"), "C");
        assert_eq!(normalize_mcq_answer("(2)"), "B");
        assert_eq!(normalize_mcq_answer("[4]"), "D");
        assert_eq!(normalize_mcq_answer("Option 1"), "A");
        assert_eq!(normalize_mcq_answer("b"), "B");
        assert_eq!(normalize_mcq_answer("12"), "12");
        assert_eq!(normalize_mcq_answer("$45"), "$45");
    }

    #[test]
    fn test_json_with_chatter_and_fences() {
        let response = "Here are the answers:\n```json\n{\n  \"P1A_1\": \"4\",\n  \"P1B_21a\": \"11/12\",\n  \"P1B_21b\": 30,\n  \"P2_6A\": \"109°\"\n}\n```";
        let key = keyed(extract_answer_key(response, 19));
        assert_eq!(key.len(), 4);
        assert_eq!(key.get("P1A_1").unwrap().answer_text, "D");
        assert_eq!(key.get("P1B_21b").unwrap().answer_text, "30");
        let p2 = key.get("P2_6a").unwrap();
        assert_eq!(p2.part_letter, Some('a'));
        assert_eq!(p2.source_page, 19);
    }

    #[test]
    fn test_unprefixed_keys_infer_section() {
        let key = keyed(extract_answer_key(r#"{"3": "2", "21": "3/4", "40": "x"}"#, 1));
        assert_eq!(key.len(), 2);
        assert_eq!(key.get("P1A_3").unwrap().answer_text, "B");
        assert_eq!(key.get("P1B_21").unwrap().answer_text, "3/4");
    }

    #[test]
    fn test_non_mcq_digits_untouched() {
        let key = keyed(extract_answer_key(r#"{"P2_3": "2", "P1B_16": "4"}"#, 1));
        assert_eq!(key.get("P2_3").unwrap().answer_text, "2");
        assert_eq!(key.get("P1B_16").unwrap().answer_text, "4");
    }

    #[test]
    fn test_recover_tiers() {
        // unbalanced prefix defeats tier 1 and 2, the flat object survives
        let map = recover_json_object("{ broken {\"P2_1\": \"5\"}").unwrap();
        assert_eq!(map["P2_1"], "5");

        assert!(matches!(
            recover_json_object("no json here"),
            Err(ParseError::NoAnswerObject { .. })
        ));
        assert!(matches!(
            recover_json_object("[1, 2, 3]"),
            Err(ParseError::NotAFlatMap { .. })
        ));
    }

    #[test]
    fn test_line_fallback() {
        let response = "PAPER 1 BOOKLET A\nQ1: 3\nQ2: (4)\nPaper 2\nQ6 (a) 109°\n(b) 72°\nQ7:\nWorking: 100 ÷ 4 = 25, 25 × 3 = 75\nAnswer: 75\nQ8a: 4000 ml\nQ9\n$45";
        let key = keyed(extract_answer_key(response, 20));
        assert_eq!(key.get("P1A_1").unwrap().answer_text, "C");
        assert_eq!(key.get("P1A_2").unwrap().answer_text, "D");
        assert_eq!(key.get("P2_6a").unwrap().answer_text, "109°");
        assert_eq!(key.get("P2_6b").unwrap().answer_text, "72°");
        let q7 = key.get("P2_7").unwrap();
        assert_eq!(q7.answer_text, "75");
        assert_eq!(
            q7.working_text.as_deref(),
            Some("100 ÷ 4 = 25, 25 × 3 = 75")
        );
        assert_eq!(key.get("P2_8a").unwrap().answer_text, "4000 ml");
        assert_eq!(key.get("P2_9").unwrap().answer_text, "$45");
    }

    #[test]
    fn test_line_fallback_infers_section_without_header() {
        let response = "Q3 B\nQ18: 324\nQ45: 7";
        let key = keyed(parse_answer_lines(response, 2));
        assert_eq!(key.len(), 2);
        assert_eq!(key.get("P1A_3").unwrap().answer_text, "B");
        assert_eq!(key.get("P1B_18").unwrap().answer_text, "324");
    }

    #[test]
    fn test_split_part() {
        assert_eq!(split_part("(a) 109°"), (Some('a'), " 109°"));
        assert_eq!(split_part("a: 11/12"), (Some('a'), ": 11/12"));
        assert_eq!(split_part(" B"), (None, " B"));
        assert_eq!(split_part(": A"), (None, ": A"));
    }
}
