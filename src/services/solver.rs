//! Solver service - single-call capability
//!
//! Asks the oracle to solve or verify one question and parses the reply.
//! No retries and no provenance decisions here; that belongs to the flow.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::error::OracleError;
use crate::infrastructure::oracle::ModelOracle;
use crate::models::document::PageImage;
use crate::services::prompts;

static ANSWER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ANSWER:\s*([^\n]+)").expect("valid regex"));
static WORKING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)WORKING:\s*(.+?)(?:\nANSWER:|\z)").expect("valid regex")
});
static MULTI_PART_ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)ANSWER:\s*\n?((?:\([a-e]\)[ \t]*.+\n?)+)").expect("valid regex")
});
static SINGLE_ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)ANSWER:\s*(.+?)(?:\n\s*\n|\z)").expect("valid regex")
});
static MY_ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)MY_ANSWER:[ \t]*([^\n]*?)[ \t]*(?:CANDIDATE:|\n|$)").expect("valid regex")
});
static MY_SOLUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)MY_SOLUTION:\s*(.+?)(?:MY_ANSWER:|\z)").expect("valid regex")
});
static VERDICT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)VERDICT:\s*(MISMATCH|MATCH)").expect("valid regex"));
static PART_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([a-eA-E])\)[ \t]*:?").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A parsed solve reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolvedAnswer {
    pub answer: String,
    pub working: Option<String>,
}

/// Outcome of solve-then-compare verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Mismatch { my_answer: Option<String> },
    Unsure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub verdict: Verdict,
    pub working: Option<String>,
}

/// Solver service
///
/// Holds the injected oracle; every method makes exactly one call.
#[derive(Clone)]
pub struct Solver {
    oracle: Arc<dyn ModelOracle>,
}

impl Solver {
    pub fn new(oracle: Arc<dyn ModelOracle>) -> Self {
        Self { oracle }
    }

    /// Direct solve for booklet questions
    ///
    /// The image is the whole page, so the prompt carries the printed number,
    /// the text and the options of the one question to solve.
    ///
    /// # Returns
    /// `Ok(None)` when the reply carried no answer
    pub async fn solve(
        &self,
        image: &PageImage,
        pdf_question_num: u32,
        question_text: &str,
        options: Option<&BTreeMap<String, String>>,
    ) -> Result<Option<SolvedAnswer>, OracleError> {
        let prompt = prompts::solve_prompt(pdf_question_num, question_text, options);
        let response = self.oracle.transcribe(image, &prompt).await?;
        Ok(parse_solve_response(&response))
    }

    /// Paper 2 solve; the prompt names the printed question number
    pub async fn solve_long_answer(
        &self,
        image: &PageImage,
        pdf_question_num: u32,
    ) -> Result<Option<SolvedAnswer>, OracleError> {
        let prompt = prompts::solve_long_answer_prompt(pdf_question_num);
        let response = self.oracle.transcribe(image, &prompt).await?;
        Ok(parse_long_answer_response(&response))
    }

    /// Last-resort solve asking only for the answer value
    pub async fn solve_lenient(&self, image: &PageImage) -> Result<Option<SolvedAnswer>, OracleError> {
        let response = self.oracle.transcribe(image, prompts::SOLVE_LENIENT).await?;
        Ok(parse_lenient_response(&response))
    }

    /// Solve independently, then compare with `candidate`
    pub async fn verify(
        &self,
        image: &PageImage,
        pdf_question_num: u32,
        question_text: &str,
        candidate: &str,
    ) -> Result<Verification, OracleError> {
        let prompt = prompts::verify_prompt(pdf_question_num, question_text, candidate);
        let response = self.oracle.transcribe(image, &prompt).await?;
        Ok(parse_verify_response(&response, candidate))
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

/// `WORKING:` block followed by a one-line `ANSWER:`
pub fn parse_solve_response(response: &str) -> Option<SolvedAnswer> {
    let answer = capture(&ANSWER_LINE, response)?;
    debug!("parsed solve answer: {}", answer);
    Some(SolvedAnswer {
        answer,
        working: capture(&WORKING, response),
    })
}

/// Multi-part `(a) ..` lines after `ANSWER:` win over a single answer
pub fn parse_long_answer_response(response: &str) -> Option<SolvedAnswer> {
    let answer = capture(&MULTI_PART_ANSWER, response).or_else(|| capture(&SINGLE_ANSWER, response))?;
    Some(SolvedAnswer {
        answer,
        working: capture(&WORKING, response),
    })
}

/// Whole reply when it looks multi-part, otherwise its first non-empty line
pub fn parse_lenient_response(response: &str) -> Option<SolvedAnswer> {
    let trimmed = response.trim();
    let answer = if trimmed.contains('(') && trimmed.contains(')') {
        non_empty(trimmed)
    } else {
        trimmed.lines().find_map(non_empty)
    }?;
    Some(SolvedAnswer {
        answer,
        working: None,
    })
}

/// An explicit verdict wins; otherwise compare `MY_ANSWER` with the candidate
pub fn parse_verify_response(response: &str, candidate: &str) -> Verification {
    let my_answer = capture(&MY_ANSWER, response);
    let working = capture(&MY_SOLUTION, response);

    let verdict = match VERDICT.captures(response).and_then(|c| c.get(1)) {
        Some(m) if m.as_str().eq_ignore_ascii_case("match") => Verdict::Match,
        Some(_) => Verdict::Mismatch { my_answer },
        None => match my_answer {
            Some(mine) if normalize_for_compare(&mine) == normalize_for_compare(candidate) => {
                Verdict::Match
            }
            Some(mine) => Verdict::Mismatch {
                my_answer: Some(mine),
            },
            None => Verdict::Unsure,
        },
    };

    Verification { verdict, working }
}

/// Case and whitespace insensitive form used for answer comparison
pub fn normalize_for_compare(answer: &str) -> String {
    let trimmed = answer.trim();
    if matches!(trimmed.to_ascii_uppercase().as_str(), "A" | "B" | "C" | "D") {
        return trimmed.to_ascii_uppercase();
    }
    WHITESPACE.replace_all(trimmed, " ").to_lowercase()
}

/// Keep only the segment for `part` from a multi-part `(a) .. (b) ..` answer
///
/// Answers without that part marker come back unchanged.
pub fn pick_part_answer(answer: &str, part: char) -> String {
    let markers: Vec<_> = PART_MARKER.captures_iter(answer).collect();
    let wanted = part.to_ascii_lowercase();

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(letter)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !letter.as_str().eq_ignore_ascii_case(&wanted.to_string()) {
            continue;
        }
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(answer.len(), |m| m.start());
        if let Some(segment) = non_empty(&answer[whole.end()..end]) {
            return segment;
        }
    }
    answer.trim().to_string()
}
