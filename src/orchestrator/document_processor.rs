//! Document processor - orchestration layer
//!
//! Runs one document end to end, strictly in order:
//!
//! 1. **Pages**: classify, load the image, transcribe, parse; the image is
//!    dropped before the next page is loaded
//! 2. **Identities**: normalize drafts, drop conflicts
//! 3. **Validation**: section counts against the section table
//! 4. **Reconciliation**: one `ReconcileFlow` run per question, then upsert
//!
//! Failures stay inside their unit: a page failure skips the page, a
//! question failure is recorded as `failed`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::infrastructure::oracle::ModelOracle;
use crate::infrastructure::store::{QuestionFields, QuestionStore};
use crate::models::answer_key::AnswerKey;
use crate::models::document::{DocumentInput, ImageSource, PageInput, PageSignal};
use crate::models::question::{NormalizedQuestion, Provenance, QuestionDraft, ResolvedAnswer};
use crate::models::section::PageRole;
use crate::services::answer_key_extractor::extract_answer_key;
use crate::services::identity_normalizer::{normalize_all, IdentityRegistry};
use crate::services::page_classifier::page_signal;
use crate::services::prompts;
use crate::services::response_parser::parse_page_response;
use crate::services::review_writer::{ReviewReason, ReviewWriter};
use crate::services::validator::validate_section_counts;
use crate::utils::logging::truncate_text;
use crate::workflow::{FlowResult, QuestionCtx, ReconcileFlow};

/// Resolved questions by outcome category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionCounts {
    pub trusted: usize,
    pub ai_solved: usize,
    pub ai_solved_lenient: usize,
    pub ai_solved_no_key: usize,
    pub failed: usize,
    pub low_confidence: usize,
    /// Left without an answer because the run was interrupted
    pub unresolved: usize,
}

impl ResolutionCounts {
    pub fn record(&mut self, resolved: &ResolvedAnswer) {
        match resolved.provenance {
            Provenance::AnswerKey => self.trusted += 1,
            Provenance::AiSolved => self.ai_solved += 1,
            Provenance::AiSolvedLenient => self.ai_solved_lenient += 1,
            Provenance::AiSolvedNoKey => self.ai_solved_no_key += 1,
            Provenance::Failed => self.failed += 1,
        }
        if resolved.low_confidence {
            self.low_confidence += 1;
        }
    }

    pub fn merge(&mut self, other: &ResolutionCounts) {
        self.trusted += other.trusted;
        self.ai_solved += other.ai_solved;
        self.ai_solved_lenient += other.ai_solved_lenient;
        self.ai_solved_no_key += other.ai_solved_no_key;
        self.failed += other.failed;
        self.low_confidence += other.low_confidence;
        self.unresolved += other.unresolved;
    }

    pub fn resolved(&self) -> usize {
        self.trusted + self.ai_solved + self.ai_solved_lenient + self.ai_solved_no_key + self.failed
    }
}

/// Per-document statistics
#[derive(Debug, Clone, Default)]
pub struct DocumentSummary {
    pub name: String,
    pub pages_total: usize,
    pub pages_processed: usize,
    pub pages_skipped: usize,
    pub pages_failed: usize,
    pub answer_key_pages: usize,
    pub drafts: usize,
    pub questions: usize,
    pub conflicts: usize,
    pub candidates: usize,
    pub counts: ResolutionCounts,
    pub stored: usize,
    pub store_errors: usize,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

impl DocumentSummary {
    /// Lines for the run log
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("[{}]", self.name),
            format!(
                "  pages: {} total, {} processed, {} skipped, {} failed ({} answer key)",
                self.pages_total,
                self.pages_processed,
                self.pages_skipped,
                self.pages_failed,
                self.answer_key_pages
            ),
            format!(
                "  questions: {} drafts, {} kept, {} conflicts, {} candidate answers",
                self.drafts, self.questions, self.conflicts, self.candidates
            ),
            format!(
                "  resolved: trusted {}, ai-solved {}, ai-solved-lenient {}, ai-solved-no-key {}, failed {}",
                self.counts.trusted,
                self.counts.ai_solved,
                self.counts.ai_solved_lenient,
                self.counts.ai_solved_no_key,
                self.counts.failed
            ),
            format!(
                "  low confidence: {}, unresolved: {}, stored: {}, store errors: {}",
                self.counts.low_confidence, self.counts.unresolved, self.stored, self.store_errors
            ),
        ];
        lines.extend(self.warnings.iter().map(|w| format!("  warning: {}", w)));
        if self.cancelled {
            lines.push("  cancelled: partial results".to_string());
        }
        lines
    }
}

/// Processes one document at a time with injected resources
pub struct DocumentProcessor {
    oracle: Arc<dyn ModelOracle>,
    store: Arc<dyn QuestionStore>,
    review: ReviewWriter,
    flow: ReconcileFlow,
    config: Config,
    cancel: Arc<AtomicBool>,
}

impl DocumentProcessor {
    pub fn new(
        oracle: Arc<dyn ModelOracle>,
        store: Arc<dyn QuestionStore>,
        config: &Config,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            flow: ReconcileFlow::new(oracle.clone(), config, cancel.clone()),
            review: ReviewWriter::with_path(config.review_file.clone()),
            oracle,
            store,
            config: config.clone(),
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Process one document
    ///
    /// # Arguments
    /// - `document`: pages plus school/year metadata
    /// - `document_index`: position in the batch (display only)
    ///
    /// # Returns
    /// The document summary; never fails as a whole
    pub async fn process(&self, document: &DocumentInput, document_index: usize) -> DocumentSummary {
        let mut summary = DocumentSummary {
            name: document.name.clone(),
            pages_total: document.pages.len(),
            ..Default::default()
        };

        // ========== Pages ==========
        let mut answer_key = AnswerKey::new();
        let mut drafts: Vec<QuestionDraft> = Vec::new();
        let total_pages = document.total_pages();

        for page in &document.pages {
            if self.cancelled() {
                warn!("[doc {}] ⚠️ interrupted, no further pages", document_index);
                summary.cancelled = true;
                break;
            }

            let signal = page_signal(page.page_number, total_pages, &page.text_hint);
            if signal.role == PageRole::Skip {
                debug!("[doc {}] [page {}] skipped", document_index, signal.page_number);
                summary.pages_skipped += 1;
                continue;
            }

            let Some(response) = self.transcribe_page(page, &signal, document_index).await else {
                summary.pages_failed += 1;
                continue;
            };
            summary.pages_processed += 1;

            if signal.role == PageRole::AnswerKey {
                let candidates = extract_answer_key(&response, signal.page_number);
                info!(
                    "[doc {}] [page {}] ✓ {} candidate answer(s)",
                    document_index,
                    signal.page_number,
                    candidates.len()
                );
                summary.answer_key_pages += 1;
                answer_key.extend(candidates);
            } else {
                let page_drafts = parse_page_response(
                    &response,
                    signal.role,
                    signal.page_number,
                    &self.config.sections,
                );
                if page_drafts.is_empty() {
                    warn!(
                        "[doc {}] [page {}] ⚠️ no questions parsed from {} page (hint: '{}')",
                        document_index,
                        signal.page_number,
                        signal.role.label(),
                        truncate_text(signal.text_hint.trim(), 60)
                    );
                } else {
                    info!(
                        "[doc {}] [page {}] ✓ {} question(s) from {} page",
                        document_index,
                        signal.page_number,
                        page_drafts.len(),
                        signal.role.label()
                    );
                }
                drafts.extend(page_drafts);
            }
        }

        summary.candidates = answer_key.len();
        summary.drafts = drafts.len();
        if self.config.verbose_logging {
            for candidate in answer_key.sorted() {
                debug!(
                    "[doc {}]   {} = {}",
                    document_index,
                    candidate.key,
                    truncate_text(&candidate.answer_text, 40)
                );
            }
        }

        // ========== Identities ==========
        let mut registry = IdentityRegistry::new();
        let questions = normalize_all(
            &document.school,
            document.year,
            drafts,
            &self.config.sections,
            &mut registry,
        );
        summary.questions = questions.len();
        summary.conflicts = registry.conflicts().len();
        for conflict in registry.conflicts() {
            let detail = format!(
                "printed Q{} on page {} dropped, identity already taken",
                conflict.pdf_question_num, conflict.page_number
            );
            self.write_review(
                &document.name,
                &conflict.identity.to_string(),
                ReviewReason::IdentityConflict,
                &detail,
            )
            .await;
        }

        // ========== Validation ==========
        for warning in validate_section_counts(&questions, &self.config.sections) {
            warn!("[doc {}] ⚠️ {}", document_index, warning);
            summary.warnings.push(warning.to_string());
        }

        // ========== Reconciliation ==========
        let images: HashMap<u32, &ImageSource> = document
            .pages
            .iter()
            .map(|p| (p.page_number, &p.image))
            .collect();

        let total = questions.len();
        for (i, question) in questions.iter().enumerate() {
            let ctx = QuestionCtx::new(&document.name, document_index, i + 1, total, question);
            let image = images.get(&question.draft.page_number).copied();

            let resolved = match self.flow.run(question, &answer_key, image, &ctx).await {
                FlowResult::Resolved(resolved) => {
                    summary.counts.record(&resolved);
                    self.review_resolved(&document.name, &resolved).await;
                    Some(resolved)
                }
                FlowResult::Cancelled => {
                    summary.cancelled = true;
                    summary.counts.unresolved += 1;
                    None
                }
            };

            self.store_question(question, resolved.as_ref(), &ctx, &mut summary)
                .await;
        }

        log_document_complete(document_index, &summary);
        summary
    }

    /// Load the page image, send the role prompt, release the image
    async fn transcribe_page(
        &self,
        page: &PageInput,
        signal: &PageSignal,
        document_index: usize,
    ) -> Option<String> {
        let prompt = match signal.role {
            PageRole::Mcq => prompts::MCQ_EXTRACTION,
            PageRole::AnswerKey => prompts::EXTRACT_ANSWERS,
            PageRole::ShortAnswer | PageRole::LongAnswer => prompts::MULTI_PART_EXTRACTION,
            PageRole::Skip => return None,
        };

        let image = match page.image.load().await {
            Ok(image) => image,
            Err(e) => {
                error!(
                    "[doc {}] [page {}] ❌ image failed to load: {}",
                    document_index, signal.page_number, e
                );
                return None;
            }
        };

        info!(
            "[doc {}] [page {}] 📤 transcribing as {}",
            document_index,
            signal.page_number,
            signal.role.label()
        );
        match self.oracle.transcribe(&image, prompt).await {
            Ok(response) => Some(response),
            Err(e) => {
                error!(
                    "[doc {}] [page {}] ❌ transcription failed: {}",
                    document_index, signal.page_number, e
                );
                None
            }
        }
    }

    async fn store_question(
        &self,
        question: &NormalizedQuestion,
        resolved: Option<&ResolvedAnswer>,
        ctx: &QuestionCtx,
        summary: &mut DocumentSummary,
    ) {
        let fields = QuestionFields::from_question(question, resolved);
        match self
            .store
            .upsert(&question.identity, &fields, self.config.overwrite_answers)
            .await
        {
            Ok(outcome) => {
                summary.stored += 1;
                debug!(
                    "{} stored as #{} (created: {}, answer written: {})",
                    ctx, outcome.id, outcome.created, outcome.answer_written
                );
            }
            Err(e) => {
                summary.store_errors += 1;
                error!("{} ❌ store failed: {}", ctx, e);
            }
        }
    }

    async fn review_resolved(&self, document_name: &str, resolved: &ResolvedAnswer) {
        let subject = resolved.identity.to_string();
        if resolved.is_failed() {
            self.write_review(document_name, &subject, ReviewReason::Failed, "no answer could be extracted")
                .await;
        } else if resolved.low_confidence {
            let detail = format!("{} {}", resolved.provenance, resolved.answer_text);
            self.write_review(document_name, &subject, ReviewReason::LowConfidence, &detail)
                .await;
        }
    }

    async fn write_review(&self, document_name: &str, subject: &str, reason: ReviewReason, detail: &str) {
        if let Err(e) = self.review.write(document_name, subject, reason, detail).await {
            warn!("⚠️ review line not written: {}", e);
        }
    }
}

fn log_document_complete(document_index: usize, summary: &DocumentSummary) {
    info!("\n{}", "─".repeat(60));
    info!(
        "[doc {}] ✓ {} done: {} question(s), {} trusted, {} solved, {} failed",
        document_index,
        summary.name,
        summary.questions,
        summary.counts.trusted,
        summary.counts.ai_solved + summary.counts.ai_solved_lenient + summary.counts.ai_solved_no_key,
        summary.counts.failed
    );
    if summary.cancelled {
        warn!("[doc {}] ⚠️ interrupted, partial results", document_index);
    }
    info!("{}", "─".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionIdentity;
    use crate::models::section::Section;

    #[test]
    fn test_counts_record_and_merge() {
        let id = QuestionIdentity::new("Tao Nan", 2025, Section::P2, 9, None);
        let mut counts = ResolutionCounts::default();
        counts.record(&ResolvedAnswer::failed(id.clone()));
        counts.record(&ResolvedAnswer {
            identity: id,
            answer_text: "6".to_string(),
            working_text: None,
            provenance: Provenance::AiSolvedLenient,
            low_confidence: true,
        });

        let mut total = ResolutionCounts {
            trusted: 3,
            ..Default::default()
        };
        total.merge(&counts);
        assert_eq!(total.resolved(), 5);
        assert_eq!(total.failed, 1);
        assert_eq!(total.low_confidence, 1);
    }

    #[test]
    fn test_summary_lines() {
        let summary = DocumentSummary {
            name: "Tao Nan 2025".to_string(),
            warnings: vec!["P1B: no questions found".to_string()],
            cancelled: true,
            ..Default::default()
        };
        let lines = summary.lines();
        assert_eq!(lines[0], "[Tao Nan 2025]");
        assert!(lines.contains(&"  warning: P1B: no questions found".to_string()));
        assert_eq!(lines.last().unwrap(), "  cancelled: partial results");
    }
}
