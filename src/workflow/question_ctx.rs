//! Question context
//!
//! Wraps "which question of which document am I on" for log lines.

use std::fmt::Display;

use crate::models::question::NormalizedQuestion;

#[derive(Debug, Clone)]
pub struct QuestionCtx {
    /// Document display name, `school year`
    pub document_name: String,

    /// Document index in the batch (display only)
    pub document_index: usize,

    /// 1-based position among the document's questions
    pub position: usize,

    pub total: usize,

    /// e.g. `P2 Q6(a)`, with the printed number
    pub label: String,
}

impl QuestionCtx {
    pub fn new(
        document_name: impl Into<String>,
        document_index: usize,
        position: usize,
        total: usize,
        question: &NormalizedQuestion,
    ) -> Self {
        Self {
            document_name: document_name.into(),
            document_index,
            position,
            total,
            label: format!(
                "{} {}",
                question.identity.section.code(),
                question.draft.label()
            ),
        }
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[doc {} {}/{} {}]",
            self.document_index, self.position, self.total, self.label
        )
    }
}
