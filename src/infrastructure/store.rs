//! Question bank persistence capability
//!
//! Upsert is idempotent on `QuestionIdentity`. Question-body fields always
//! refresh; answer fields are only written when the stored answer is empty
//! or the caller passes `overwrite`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StorageError;
use crate::models::question::{NormalizedQuestion, Provenance, QuestionIdentity, ResolvedAnswer};
use crate::models::section::Section;

/// Answer-bearing fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerFields {
    pub answer_text: String,
    pub working_text: Option<String>,
    pub provenance: Provenance,
    pub low_confidence: bool,
}

impl From<&ResolvedAnswer> for AnswerFields {
    fn from(resolved: &ResolvedAnswer) -> Self {
        Self {
            answer_text: resolved.answer_text.clone(),
            working_text: resolved.working_text.clone(),
            provenance: resolved.provenance,
            low_confidence: resolved.low_confidence,
        }
    }
}

/// Everything written for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionFields {
    pub pdf_question_num: u32,
    pub page_number: u32,
    pub marks: u32,
    pub text: String,
    pub options: Option<BTreeMap<String, String>>,
    pub diagram_description: Option<String>,
    pub shared_context: Option<String>,
    pub answer: Option<AnswerFields>,
}

impl QuestionFields {
    pub fn from_question(question: &NormalizedQuestion, resolved: Option<&ResolvedAnswer>) -> Self {
        let draft = &question.draft;
        Self {
            pdf_question_num: question.pdf_question_num,
            page_number: draft.page_number,
            marks: draft.marks,
            text: draft.text.clone(),
            options: draft.options.clone(),
            diagram_description: draft.diagram_description.clone(),
            shared_context: draft.shared_context.clone(),
            answer: resolved.map(AnswerFields::from),
        }
    }
}

/// A stored question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: u64,
    pub identity: QuestionIdentity,
    /// Printed number, display only
    pub pdf_question_num: u32,
    pub page_number: u32,
    pub marks: u32,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_context: Option<String>,
    #[serde(default)]
    pub answer_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(default)]
    pub low_confidence: bool,
    pub created_at: String,
}

impl QuestionRecord {
    fn create(id: u64, identity: &QuestionIdentity, fields: &QuestionFields) -> Self {
        let mut record = Self {
            id,
            identity: identity.clone(),
            pdf_question_num: fields.pdf_question_num,
            page_number: fields.page_number,
            marks: fields.marks,
            text: String::new(),
            options: None,
            diagram_description: None,
            shared_context: None,
            answer_text: String::new(),
            working_text: None,
            provenance: None,
            low_confidence: false,
            created_at: chrono::Local::now().to_rfc3339(),
        };
        record.refresh_question(fields);
        record
    }

    fn refresh_question(&mut self, fields: &QuestionFields) {
        self.pdf_question_num = fields.pdf_question_num;
        self.page_number = fields.page_number;
        self.marks = fields.marks;
        self.text = fields.text.clone();
        self.options = fields.options.clone();
        self.diagram_description = fields.diagram_description.clone();
        self.shared_context = fields.shared_context.clone();
    }

    /// Apply the answer merge rule
    ///
    /// # Returns
    /// Whether the answer fields were written
    fn merge_answer(&mut self, answer: Option<&AnswerFields>, overwrite: bool) -> bool {
        let Some(answer) = answer else {
            return false;
        };
        let stored_empty = self.answer_text.trim().is_empty();
        let incoming_empty = answer.answer_text.trim().is_empty();
        // an empty answer never replaces a non-empty one, even with overwrite
        if !stored_empty && (incoming_empty || !overwrite) {
            return false;
        }
        if stored_empty && incoming_empty && self.provenance.is_some() {
            return false;
        }
        self.answer_text = answer.answer_text.clone();
        self.working_text = answer.working_text.clone();
        self.provenance = Some(answer.provenance);
        self.low_confidence = answer.low_confidence;
        true
    }

    pub fn has_answer(&self) -> bool {
        !self.answer_text.trim().is_empty()
    }
}

/// Result of one upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: u64,
    pub created: bool,
    pub answer_written: bool,
}

/// `list` filter; `None` matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub school: Option<String>,
    pub year: Option<i32>,
    pub section: Option<Section>,
}

impl RecordFilter {
    pub fn document(school: impl Into<String>, year: i32) -> Self {
        Self {
            school: Some(school.into()),
            year: Some(year),
            section: None,
        }
    }

    pub fn matches(&self, identity: &QuestionIdentity) -> bool {
        self.school.as_ref().map_or(true, |s| s == &identity.school)
            && self.year.map_or(true, |y| y == identity.year)
            && self.section.map_or(true, |s| s == identity.section)
    }
}

/// Persistence contract
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Insert or update the record for `identity`
    async fn upsert(
        &self,
        identity: &QuestionIdentity,
        fields: &QuestionFields,
        overwrite: bool,
    ) -> Result<UpsertOutcome, StorageError>;

    async fn get(&self, identity: &QuestionIdentity) -> Result<Option<QuestionRecord>, StorageError>;

    /// Records ordered by school, year, section, stored number, part
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<QuestionRecord>, StorageError>;
}

/// In-memory bank shared by the store backends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bank {
    #[serde(default = "first_id")]
    pub next_id: u64,
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
}

fn first_id() -> u64 {
    1
}

impl Bank {
    pub fn new() -> Self {
        Self {
            next_id: first_id(),
            questions: Vec::new(),
        }
    }

    pub fn upsert(
        &mut self,
        identity: &QuestionIdentity,
        fields: &QuestionFields,
        overwrite: bool,
    ) -> UpsertOutcome {
        if let Some(record) = self.questions.iter_mut().find(|r| &r.identity == identity) {
            record.refresh_question(fields);
            let answer_written = record.merge_answer(fields.answer.as_ref(), overwrite);
            return UpsertOutcome {
                id: record.id,
                created: false,
                answer_written,
            };
        }

        let id = self.next_id.max(1);
        self.next_id = id + 1;
        let mut record = QuestionRecord::create(id, identity, fields);
        let answer_written = record.merge_answer(fields.answer.as_ref(), overwrite);
        self.questions.push(record);
        UpsertOutcome {
            id,
            created: true,
            answer_written,
        }
    }

    pub fn get(&self, identity: &QuestionIdentity) -> Option<QuestionRecord> {
        self.questions.iter().find(|r| &r.identity == identity).cloned()
    }

    pub fn list(&self, filter: &RecordFilter) -> Vec<QuestionRecord> {
        let mut records: Vec<QuestionRecord> = self
            .questions
            .iter()
            .filter(|r| filter.matches(&r.identity))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.identity.sort_key());
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(number: u32) -> QuestionIdentity {
        QuestionIdentity::new("Tao Nan", 2025, Section::P2, number, None)
    }

    fn fields(text: &str, answer: Option<(&str, Provenance)>) -> QuestionFields {
        QuestionFields {
            pdf_question_num: 6,
            page_number: 12,
            marks: 3,
            text: text.to_string(),
            options: None,
            diagram_description: None,
            shared_context: None,
            answer: answer.map(|(a, p)| AnswerFields {
                answer_text: a.to_string(),
                working_text: None,
                provenance: p,
                low_confidence: false,
            }),
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut bank = Bank::new();
        let f = fields("Find x.", Some(("12", Provenance::AnswerKey)));
        let first = bank.upsert(&identity(6), &f, false);
        let snapshot = bank.clone();
        let second = bank.upsert(&identity(6), &f, false);

        assert!(first.created && first.answer_written);
        assert!(!second.created && !second.answer_written);
        assert_eq!(first.id, second.id);
        assert_eq!(bank, snapshot);
    }

    #[test]
    fn test_answer_protected_without_overwrite() {
        let mut bank = Bank::new();
        bank.upsert(&identity(6), &fields("Find x.", Some(("12", Provenance::AnswerKey))), false);
        let outcome = bank.upsert(
            &identity(6),
            &fields("Find x, the angle.", Some(("14", Provenance::AiSolved))),
            false,
        );
        let record = bank.get(&identity(6)).unwrap();
        assert!(!outcome.answer_written);
        assert_eq!(record.answer_text, "12");
        // question body always refreshes
        assert_eq!(record.text, "Find x, the angle.");
    }

    #[test]
    fn test_overwrite_replaces_answer_but_never_with_empty() {
        let mut bank = Bank::new();
        bank.upsert(&identity(6), &fields("Q", Some(("12", Provenance::AiSolvedLenient))), false);
        let replaced = bank.upsert(&identity(6), &fields("Q", Some(("14", Provenance::AnswerKey))), true);
        assert!(replaced.answer_written);
        assert_eq!(bank.get(&identity(6)).unwrap().answer_text, "14");

        let emptied = bank.upsert(&identity(6), &fields("Q", Some(("", Provenance::Failed))), true);
        assert!(!emptied.answer_written);
        assert_eq!(
            bank.get(&identity(6)).unwrap().provenance,
            Some(Provenance::AnswerKey)
        );
    }

    #[test]
    fn test_failed_then_solved() {
        let mut bank = Bank::new();
        bank.upsert(&identity(9), &fields("Q", Some(("", Provenance::Failed))), false);
        assert_eq!(bank.get(&identity(9)).unwrap().provenance, Some(Provenance::Failed));
        let solved = bank.upsert(&identity(9), &fields("Q", Some(("$45", Provenance::AiSolved))), false);
        assert!(solved.answer_written);
        assert!(bank.get(&identity(9)).unwrap().has_answer());
    }

    #[test]
    fn test_list_filter_and_order() {
        let mut bank = Bank::new();
        let p1a = QuestionIdentity::new("Tao Nan", 2025, Section::P1A, 2, None);
        let other = QuestionIdentity::new("Rosyth", 2025, Section::P1A, 1, None);
        let part_b = QuestionIdentity::new("Tao Nan", 2025, Section::P2, 6, Some('b'));
        let part_a = QuestionIdentity::new("Tao Nan", 2025, Section::P2, 6, Some('a'));
        for id in [&part_b, &p1a, &other, &part_a] {
            bank.upsert(id, &fields("Q", None), false);
        }

        let listed = bank.list(&RecordFilter::document("Tao Nan", 2025));
        let order: Vec<_> = listed.iter().map(|r| r.identity.clone()).collect();
        assert_eq!(order, vec![p1a, part_a, part_b]);

        let p2_only = bank.list(&RecordFilter {
            section: Some(Section::P2),
            ..RecordFilter::default()
        });
        assert_eq!(p2_only.len(), 2);
    }
}
