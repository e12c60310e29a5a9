use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::section::Section;

/// One question (or one part of a multi-part question) as parsed from a page
///
/// Transient: lives only while its document is being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    /// Number as printed in the document
    pub document_question_number: u32,
    /// Section assigned from the page role, before identity normalization
    pub section: Section,
    /// 'a'..='e' for multi-part questions
    pub part_letter: Option<char>,
    pub text: String,
    /// MCQ options keyed by letter
    pub options: Option<BTreeMap<String, String>>,
    pub diagram_description: Option<String>,
    pub marks: u32,
    /// Stem shared by all parts of a multi-part question
    pub shared_context: Option<String>,
    /// Page the draft was transcribed from
    pub page_number: u32,
}

impl QuestionDraft {
    /// Display label such as `Q21` or `Q6(a)`
    pub fn label(&self) -> String {
        match self.part_letter {
            Some(part) => format!("Q{}({})", self.document_question_number, part),
            None => format!("Q{}", self.document_question_number),
        }
    }
}

/// Canonical storage identity; the tuple is the upsert idempotency key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionIdentity {
    pub school: String,
    pub year: i32,
    pub section: Section,
    pub stored_question_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_letter: Option<char>,
}

impl QuestionIdentity {
    pub fn new(
        school: impl Into<String>,
        year: i32,
        section: Section,
        stored_question_number: u32,
        part_letter: Option<char>,
    ) -> Self {
        Self {
            school: school.into(),
            year,
            section,
            stored_question_number,
            part_letter: part_letter.map(|c| c.to_ascii_lowercase()),
        }
    }

    /// Ordering used for listing: school, year, section, number, part
    pub fn sort_key(&self) -> (String, i32, u8, u32, char) {
        (
            self.school.clone(),
            self.year,
            self.section.order(),
            self.stored_question_number,
            self.part_letter.unwrap_or(' '),
        )
    }
}

impl fmt::Display for QuestionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} Q{}",
            self.school, self.year, self.section, self.stored_question_number
        )?;
        if let Some(part) = self.part_letter {
            write!(f, "({})", part)?;
        }
        Ok(())
    }
}

/// A draft after identity normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuestion {
    pub identity: QuestionIdentity,
    /// Printed number; display only, never part of the identity
    pub pdf_question_num: u32,
    pub draft: QuestionDraft,
}

/// How a resolved answer was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "answer-key")]
    AnswerKey,
    #[serde(rename = "ai-solved")]
    AiSolved,
    #[serde(rename = "ai-solved-lenient")]
    AiSolvedLenient,
    #[serde(rename = "ai-solved-no-key")]
    AiSolvedNoKey,
    #[serde(rename = "failed")]
    Failed,
}

impl Provenance {
    pub fn tag(self) -> &'static str {
        match self {
            Provenance::AnswerKey => "answer-key",
            Provenance::AiSolved => "ai-solved",
            Provenance::AiSolvedLenient => "ai-solved-lenient",
            Provenance::AiSolvedNoKey => "ai-solved-no-key",
            Provenance::Failed => "failed",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.tag())
    }
}

/// Final answer for one question, produced exactly once per draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAnswer {
    pub identity: QuestionIdentity,
    /// Empty when the provenance is `Failed`
    pub answer_text: String,
    pub working_text: Option<String>,
    pub provenance: Provenance,
    /// Set when a fallback tier produced the answer; meant for human review
    pub low_confidence: bool,
}

impl ResolvedAnswer {
    pub fn failed(identity: QuestionIdentity) -> Self {
        Self {
            identity,
            answer_text: String::new(),
            working_text: None,
            provenance: Provenance::Failed,
            low_confidence: false,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.provenance == Provenance::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display_and_part_case() {
        let id = QuestionIdentity::new("St Nicholas", 2025, Section::P2, 6, Some('A'));
        assert_eq!(id.part_letter, Some('a'));
        assert_eq!(id.to_string(), "St Nicholas 2025 P2 Q6(a)");
    }

    #[test]
    fn test_provenance_serde_tags() {
        let json = serde_json::to_string(&Provenance::AiSolvedLenient).unwrap();
        assert_eq!(json, "\"ai-solved-lenient\"");
        assert_eq!(Provenance::AnswerKey.to_string(), "[answer-key]");
    }
}
