//! Identity normalizer
//!
//! Maps printed question numbers onto section-local storage numbers. The
//! printed paper numbers Booklet B on from Booklet A (16-30); storage numbers
//! every section from 1.

use std::collections::HashSet;
use tracing::warn;

use crate::models::question::{NormalizedQuestion, QuestionDraft, QuestionIdentity};
use crate::models::section::{Section, SectionTable};

/// Normalize the section and number of one draft
///
/// # Arguments
/// * `school`, `year` - document metadata
/// * `draft` - parsed draft carrying the page-assigned section
/// * `sections` - section limits and offsets
pub fn normalize_identity(
    school: &str,
    year: i32,
    draft: QuestionDraft,
    sections: &SectionTable,
) -> NormalizedQuestion {
    let printed = draft.document_question_number;
    let mut section = draft.section;

    // An MCQ page number beyond Booklet A belongs to the next section
    let mcq = sections.spec(Section::P1A);
    if section == Section::P1A && printed > mcq.max_questions {
        if let Some(next) = section.next() {
            section = next;
        }
    }

    let spec = sections.spec(section);
    let stored = if spec.numbering_offset > 0 && printed > spec.max_questions {
        printed - spec.numbering_offset
    } else {
        printed
    };

    let identity = QuestionIdentity::new(school, year, section, stored, draft.part_letter);
    NormalizedQuestion {
        identity,
        pdf_question_num: printed,
        draft: QuestionDraft { section, ..draft },
    }
}

/// Drafts whose identity repeats one already produced in the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConflict {
    pub identity: QuestionIdentity,
    pub pdf_question_num: u32,
    pub page_number: u32,
}

/// Identities seen so far in a run; the first draft for an identity wins
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    seen: HashSet<QuestionIdentity>,
    conflicts: Vec<IdentityConflict>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a normalized question
    ///
    /// # Returns
    /// The question when its identity is new, `None` when it conflicts
    pub fn admit(&mut self, question: NormalizedQuestion) -> Option<NormalizedQuestion> {
        if self.seen.insert(question.identity.clone()) {
            return Some(question);
        }
        warn!(
            "⚠️ [{}] duplicate identity (printed Q{}, page {}), keeping the first",
            question.identity, question.pdf_question_num, question.draft.page_number
        );
        self.conflicts.push(IdentityConflict {
            identity: question.identity,
            pdf_question_num: question.pdf_question_num,
            page_number: question.draft.page_number,
        });
        None
    }

    pub fn conflicts(&self) -> &[IdentityConflict] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Normalize a document's drafts, dropping identity conflicts
pub fn normalize_all(
    school: &str,
    year: i32,
    drafts: Vec<QuestionDraft>,
    sections: &SectionTable,
    registry: &mut IdentityRegistry,
) -> Vec<NormalizedQuestion> {
    drafts
        .into_iter()
        .map(|d| normalize_identity(school, year, d, sections))
        .filter_map(|q| registry.admit(q))
        .collect()
}
