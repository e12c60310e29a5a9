//! Batch processor - orchestration layer
//!
//! ## Responsibilities
//!
//! 1. **Startup**: run log, oracle client, question bank
//! 2. **Loading**: every document manifest in the documents folder
//! 3. **Processing**: documents one after another through `DocumentProcessor`
//! 4. **Cancellation**: a shared flag set on Ctrl-C; partial results are kept
//! 5. **Summary**: per-batch counts by outcome, logged and appended to the run log
//!
//! This is the only module that constructs the oracle and the store; every
//! layer below receives them.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::{ModelOracle, OpenAiOracle, QuestionStore, RateLimitedOracle, TomlStore};
use crate::models::document::DocumentInput;
use crate::models::loaders::load_all_manifests;
use crate::orchestrator::document_processor::{DocumentProcessor, DocumentSummary, ResolutionCounts};
use crate::utils::logging::{
    append_to_log_file, init_log_file, log_document_start, log_documents_loaded, log_startup,
};

/// Whole-run statistics
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub documents: usize,
    pub pages_processed: usize,
    pub pages_failed: usize,
    pub questions: usize,
    pub conflicts: usize,
    pub counts: ResolutionCounts,
    pub store_errors: usize,
    pub cancelled: bool,
    pub per_document: Vec<DocumentSummary>,
}

impl BatchSummary {
    pub fn add(&mut self, document: DocumentSummary) {
        self.documents += 1;
        self.pages_processed += document.pages_processed;
        self.pages_failed += document.pages_failed;
        self.questions += document.questions;
        self.conflicts += document.conflicts;
        self.counts.merge(&document.counts);
        self.store_errors += document.store_errors;
        self.cancelled |= document.cancelled;
        self.per_document.push(document);
    }

    /// Lines for the run log: per-document blocks, then totals
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.per_document.iter().flat_map(|d| d.lines()).collect();
        lines.push(String::new());
        lines.push("=".repeat(60));
        lines.push(format!(
            "Finished: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        lines.push(format!(
            "documents: {}, pages processed: {}, pages failed: {}",
            self.documents, self.pages_processed, self.pages_failed
        ));
        lines.push(format!(
            "questions: {}, conflicts: {}, store errors: {}",
            self.questions, self.conflicts, self.store_errors
        ));
        lines.push(format!(
            "trusted: {}, ai-solved: {}, ai-solved-lenient: {}, ai-solved-no-key: {}, failed: {}",
            self.counts.trusted,
            self.counts.ai_solved,
            self.counts.ai_solved_lenient,
            self.counts.ai_solved_no_key,
            self.counts.failed
        ));
        lines.push(format!(
            "low confidence: {}, unresolved: {}",
            self.counts.low_confidence, self.counts.unresolved
        ));
        if self.cancelled {
            lines.push("run interrupted: partial results".to_string());
        }
        lines.push("=".repeat(60));
        lines
    }
}

/// Application root
pub struct App {
    config: Config,
    oracle: Arc<dyn ModelOracle>,
    store: Arc<dyn QuestionStore>,
    cancel: Arc<AtomicBool>,
}

impl App {
    /// Build the real resources from config
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(
            &config.llm_model_name,
            config.min_request_interval_ms,
            config.verify_candidates,
        );

        if config.llm_api_key.is_empty() {
            warn!("⚠️ LLM_API_KEY is empty, oracle calls will likely fail");
        }

        let oracle = RateLimitedOracle::new(OpenAiOracle::new(&config), config.min_request_interval());
        let store = TomlStore::open(&config.bank_file)
            .await
            .with_context(|| format!("failed to open question bank {}", config.bank_file))?;
        info!("✓ Question bank: {}", store.path().display());

        Ok(Self::with_resources(config, Arc::new(oracle), Arc::new(store)))
    }

    /// Wire given resources, e.g. a scripted oracle and an in-memory store
    pub fn with_resources(
        config: Config,
        oracle: Arc<dyn ModelOracle>,
        store: Arc<dyn QuestionStore>,
    ) -> Self {
        Self {
            config,
            oracle,
            store,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned cancel flag
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag checked before every page and oracle call
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Load every manifest and process the batch
    pub async fn run(&self) -> Result<BatchSummary> {
        info!("\n📁 Scanning {} for document manifests...", self.config.documents_folder);
        let documents = load_all_manifests(&self.config.documents_folder)
            .await
            .with_context(|| format!("failed to load documents from {}", self.config.documents_folder))?;

        if documents.is_empty() {
            warn!("⚠️ No document manifests found, nothing to do");
            return Ok(BatchSummary::default());
        }
        log_documents_loaded(documents.len());

        let summary = self.process_documents(&documents).await;

        print_final_stats(&summary, &self.config);
        append_to_log_file(&self.config.output_log_file, &summary.lines())?;
        Ok(summary)
    }

    /// Process documents strictly one after another
    pub async fn process_documents(&self, documents: &[DocumentInput]) -> BatchSummary {
        let processor = DocumentProcessor::new(
            self.oracle.clone(),
            self.store.clone(),
            &self.config,
            self.cancel.clone(),
        );

        let mut summary = BatchSummary::default();
        for (i, document) in documents.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!("⚠️ Interrupted, {} document(s) not started", documents.len() - i);
                summary.cancelled = true;
                break;
            }
            log_document_start(i + 1, documents.len(), &document.name, document.pages.len());
            let document_summary = processor.process(document, i + 1).await;
            summary.add(document_summary);
        }
        summary
    }
}

fn print_final_stats(summary: &BatchSummary, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 Run complete");
    info!("{}", "=".repeat(60));
    info!("📦 Documents: {}", summary.documents);
    info!("✅ Trusted (answer key): {}", summary.counts.trusted);
    info!(
        "🔍 AI solved: {} (lenient {}, no key {})",
        summary.counts.ai_solved, summary.counts.ai_solved_lenient, summary.counts.ai_solved_no_key
    );
    info!("❌ Failed: {}", summary.counts.failed);
    info!("⚠️ Low confidence: {}", summary.counts.low_confidence);
    if summary.cancelled {
        warn!("⚠️ Interrupted: {} question(s) unresolved", summary.counts.unresolved);
    }
    info!("{}", "=".repeat(60));
    info!("\nRun log: {} | review file: {}", config.output_log_file, config.review_file);
}
