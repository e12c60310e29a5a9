//! Review writer - single-unit capability
//!
//! Only knows how to append one line to the review file; no flow knowledge.

use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Why a question needs a human look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewReason {
    Failed,
    LowConfidence,
    IdentityConflict,
}

impl ReviewReason {
    pub fn label(self) -> &'static str {
        match self {
            ReviewReason::Failed => "failed",
            ReviewReason::LowConfidence => "low-confidence",
            ReviewReason::IdentityConflict => "identity-conflict",
        }
    }
}

/// Appends review lines
///
/// One line per question: `document | subject | reason | detail`.
pub struct ReviewWriter {
    review_file_path: String,
}

impl ReviewWriter {
    pub fn new() -> Self {
        Self::with_path("review.txt")
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            review_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.review_file_path
    }

    /// Append one review line
    ///
    /// # Arguments
    /// - `document`: display name of the document
    /// - `subject`: the question, e.g. `Tao Nan 2025 P2 Q6(a)`
    /// - `reason`: review category
    /// - `detail`: free text, newlines are flattened
    pub async fn write(
        &self,
        document: &str,
        subject: &str,
        reason: ReviewReason,
        detail: &str,
    ) -> AppResult<()> {
        debug!(
            "review line: {} | {} | {}",
            document,
            subject,
            reason.label()
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.review_file_path)
            .map_err(|e| AppError::file_write_failed(&self.review_file_path, e))?;

        let line = format!(
            "{} | {} | {} | {}\n",
            document,
            subject,
            reason.label(),
            detail.replace('\n', " / ")
        );

        file.write_all(line.as_bytes())
            .map_err(|e| AppError::file_write_failed(&self.review_file_path, e))?;

        Ok(())
    }
}

impl Default for ReviewWriter {
    fn default() -> Self {
        Self::new()
    }
}
