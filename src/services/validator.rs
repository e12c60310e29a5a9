//! Section validator
//!
//! Compares what a document produced against the section table. Findings are
//! warnings only; nothing here rejects a document.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::question::NormalizedQuestion;
use crate::models::section::{Section, SectionTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    MissingSection {
        section: Section,
    },
    CountMismatch {
        section: Section,
        expected: u32,
        found: u32,
    },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::MissingSection { section } => {
                write!(f, "{}: no questions found", section.code())
            }
            ValidationWarning::CountMismatch {
                section,
                expected,
                found,
            } if found < expected => write!(
                f,
                "{}: missing questions, expected {}, got {}",
                section.code(),
                expected,
                found
            ),
            ValidationWarning::CountMismatch {
                section,
                expected,
                found,
            } => write!(
                f,
                "{}: extra questions, expected {}, got {}",
                section.code(),
                expected,
                found
            ),
        }
    }
}

/// Per-section question counts; parts of one question count once
pub fn count_by_section(questions: &[NormalizedQuestion]) -> BTreeMap<Section, u32> {
    let mut numbers: BTreeMap<Section, BTreeSet<u32>> = BTreeMap::new();
    for q in questions {
        numbers
            .entry(q.identity.section)
            .or_default()
            .insert(q.identity.stored_question_number);
    }
    numbers
        .into_iter()
        .map(|(section, set)| (section, set.len() as u32))
        .collect()
}

pub fn validate_section_counts(
    questions: &[NormalizedQuestion],
    table: &SectionTable,
) -> Vec<ValidationWarning> {
    let counts = count_by_section(questions);
    table
        .specs()
        .iter()
        .filter_map(|spec| match counts.get(&spec.section) {
            None => Some(ValidationWarning::MissingSection {
                section: spec.section,
            }),
            Some(&found) if found != spec.max_questions => Some(ValidationWarning::CountMismatch {
                section: spec.section,
                expected: spec.max_questions,
                found,
            }),
            Some(_) => None,
        })
        .collect()
}
