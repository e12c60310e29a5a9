//! Reconciliation flow - flow layer
//!
//! Defines how one question gets its final answer:
//! 1. look the question up in the document's answer key
//! 2. candidate found: trust it (or verify it when configured)
//! 3. no candidate: solve with the oracle; Paper 2 gets a retry ladder and
//!    a lenient last attempt
//!
//! Every question ends in exactly one `ResolvedAnswer`. A failed question
//! never stops the ones after it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::oracle::ModelOracle;
use crate::models::answer_key::{AnswerKey, CandidateAnswer};
use crate::models::document::{ImageSource, PageImage};
use crate::models::question::{NormalizedQuestion, Provenance, ResolvedAnswer};
use crate::models::section::Section;
use crate::services::answer_key_extractor::normalize_mcq_answer;
use crate::services::solver::{pick_part_answer, SolvedAnswer, Solver, Verdict};
use crate::workflow::question_ctx::QuestionCtx;

/// Flow result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowResult {
    Resolved(ResolvedAnswer),
    /// Interrupted before an oracle call the question needed
    Cancelled,
}

/// Reconciliation flow
///
/// - owns no resources; the oracle is injected
/// - decides when to trust, verify, solve, retry and fall back
/// - checks the cancel flag before every oracle call
pub struct ReconcileFlow {
    solver: Solver,
    max_attempts: u32,
    backoff: Duration,
    verify_candidates: bool,
    cancel: Arc<AtomicBool>,
}

impl ReconcileFlow {
    pub fn new(oracle: Arc<dyn ModelOracle>, config: &Config, cancel: Arc<AtomicBool>) -> Self {
        Self {
            solver: Solver::new(oracle),
            max_attempts: config.solve_max_attempts.max(1),
            backoff: config.solve_backoff(),
            verify_candidates: config.verify_candidates,
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Resolve one question
    ///
    /// # Arguments
    /// - `question`: the normalized question
    /// - `answer_key`: read-only candidate keyspace of the document
    /// - `image`: the question's page image, loaded only if the oracle is needed
    /// - `ctx`: display context
    pub async fn run(
        &self,
        question: &NormalizedQuestion,
        answer_key: &AnswerKey,
        image: Option<&ImageSource>,
        ctx: &QuestionCtx,
    ) -> FlowResult {
        let identity = &question.identity;

        // ========== Lookup ==========
        let candidate = answer_key
            .lookup(
                identity.section,
                identity.stored_question_number,
                question.pdf_question_num,
                identity.part_letter,
            )
            .filter(|c| !c.answer_text.trim().is_empty());

        match candidate {
            Some(candidate) if !self.verify_candidates => {
                info!("{} ✓ answer key: '{}'", ctx, candidate.answer_text);
                FlowResult::Resolved(self.trusted(question, &candidate, false))
            }
            Some(candidate) => self.verify(question, &candidate, image, ctx).await,
            None => self.solve(question, image, ctx).await,
        }
    }

    fn trusted(
        &self,
        question: &NormalizedQuestion,
        candidate: &CandidateAnswer,
        low_confidence: bool,
    ) -> ResolvedAnswer {
        ResolvedAnswer {
            identity: question.identity.clone(),
            answer_text: candidate.answer_text.trim().to_string(),
            working_text: candidate.working_text.clone(),
            provenance: Provenance::AnswerKey,
            low_confidence,
        }
    }

    // ========== Verify ==========

    async fn verify(
        &self,
        question: &NormalizedQuestion,
        candidate: &CandidateAnswer,
        image: Option<&ImageSource>,
        ctx: &QuestionCtx,
    ) -> FlowResult {
        let Some(image) = self.load_image(image, ctx).await else {
            warn!("{} ⚠️ cannot verify without the page image, keeping the key", ctx);
            return FlowResult::Resolved(self.trusted(question, candidate, true));
        };
        if self.cancelled() {
            return FlowResult::Cancelled;
        }

        let verification = self
            .solver
            .verify(
                &image,
                question.pdf_question_num,
                &question.draft.text,
                &candidate.answer_text,
            )
            .await;

        let resolved = match verification {
            Ok(v) => match v.verdict {
                Verdict::Match => {
                    info!("{} ✓ verified '{}'", ctx, candidate.answer_text);
                    let mut resolved = self.trusted(question, candidate, false);
                    resolved.working_text = v.working.or(resolved.working_text);
                    resolved
                }
                Verdict::Mismatch {
                    my_answer: Some(mine),
                } => {
                    warn!(
                        "{} ⚠️ mismatch: key '{}', oracle '{}'",
                        ctx, candidate.answer_text, mine
                    );
                    ResolvedAnswer {
                        identity: question.identity.clone(),
                        answer_text: self.finish_answer(question, &mine),
                        working_text: v.working,
                        provenance: Provenance::AiSolved,
                        low_confidence: true,
                    }
                }
                Verdict::Mismatch { my_answer: None } | Verdict::Unsure => {
                    warn!("{} ⚠️ verification inconclusive, keeping the key", ctx);
                    self.trusted(question, candidate, true)
                }
            },
            Err(e) => {
                warn!("{} ⚠️ verification call failed: {}", ctx, e);
                self.trusted(question, candidate, true)
            }
        };
        FlowResult::Resolved(resolved)
    }

    // ========== Solve ==========

    async fn solve(
        &self,
        question: &NormalizedQuestion,
        image: Option<&ImageSource>,
        ctx: &QuestionCtx,
    ) -> FlowResult {
        let identity = &question.identity;
        let Some(image) = self.load_image(image, ctx).await else {
            return FlowResult::Resolved(ResolvedAnswer::failed(identity.clone()));
        };

        if identity.section != Section::P2 {
            if self.cancelled() {
                return FlowResult::Cancelled;
            }
            info!("{} 🔍 no candidate, solving", ctx);
            let draft = &question.draft;
            let solving = self.solver.solve(
                &image,
                question.pdf_question_num,
                &draft.text,
                draft.options.as_ref(),
            );
            return match solving.await {
                Ok(Some(solved)) => {
                    FlowResult::Resolved(self.solved(question, solved, Provenance::AiSolvedNoKey, ctx))
                }
                Ok(None) => {
                    warn!("{} ❌ solve reply had no answer", ctx);
                    FlowResult::Resolved(ResolvedAnswer::failed(identity.clone()))
                }
                Err(e) => {
                    warn!("{} ❌ solve call failed: {}", ctx, e);
                    FlowResult::Resolved(ResolvedAnswer::failed(identity.clone()))
                }
            };
        }

        info!("{} 🔍 no candidate, solving with retry", ctx);
        for attempt in 1..=self.max_attempts {
            if self.cancelled() {
                return FlowResult::Cancelled;
            }
            match self
                .solver
                .solve_long_answer(&image, question.pdf_question_num)
                .await
            {
                Ok(Some(solved)) => {
                    return FlowResult::Resolved(self.solved(question, solved, Provenance::AiSolved, ctx));
                }
                Ok(None) => warn!("{} [retry {}] reply had no answer", ctx, attempt),
                Err(e) => warn!("{} [retry {}] call failed: {}", ctx, attempt, e),
            }
            tokio::time::sleep(self.backoff).await;
        }

        if self.cancelled() {
            return FlowResult::Cancelled;
        }
        match self.solver.solve_lenient(&image).await {
            Ok(Some(solved)) => {
                let mut resolved = self.solved(question, solved, Provenance::AiSolvedLenient, ctx);
                resolved.low_confidence = true;
                FlowResult::Resolved(resolved)
            }
            Ok(None) => {
                warn!("{} ❌ all tiers exhausted", ctx);
                FlowResult::Resolved(ResolvedAnswer::failed(identity.clone()))
            }
            Err(e) => {
                warn!("{} ❌ lenient call failed: {}", ctx, e);
                FlowResult::Resolved(ResolvedAnswer::failed(identity.clone()))
            }
        }
    }

    fn solved(
        &self,
        question: &NormalizedQuestion,
        solved: SolvedAnswer,
        provenance: Provenance,
        ctx: &QuestionCtx,
    ) -> ResolvedAnswer {
        let answer_text = self.finish_answer(question, &solved.answer);
        info!("{} ✓ {} → {}", ctx, provenance, answer_text);
        ResolvedAnswer {
            identity: question.identity.clone(),
            answer_text,
            working_text: solved.working,
            provenance,
            low_confidence: false,
        }
    }

    /// Part selection and MCQ letter normalization for oracle answers
    fn finish_answer(&self, question: &NormalizedQuestion, answer: &str) -> String {
        let identity = &question.identity;
        let answer = match identity.part_letter {
            Some(part) => pick_part_answer(answer, part),
            None => answer.trim().to_string(),
        };
        if identity.section == Section::P1A {
            normalize_mcq_answer(&answer)
        } else {
            answer
        }
    }

    async fn load_image(
        &self,
        image: Option<&ImageSource>,
        ctx: &QuestionCtx,
    ) -> Option<Arc<PageImage>> {
        let Some(source) = image else {
            warn!("{} ❌ no page image for this question", ctx);
            return None;
        };
        match source.load().await {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("{} ❌ page image failed to load: {}", ctx, e);
                None
            }
        }
    }
}
