//! # Exam Bank
//!
//! Recovers a structured question bank from rasterized exam papers, answers
//! included, using a vision model as an OCR and solving oracle.
//!
//! ## Architecture
//!
//! Four layers, each depending only downward:
//!
//! ### ① Infrastructure
//! - `infrastructure/` - owns the scarce resources, exposes capabilities only
//! - `ModelOracle` - text-in/text-out over one page image (`OpenAiOracle`, `RateLimitedOracle`)
//! - `QuestionStore` - idempotent upsert by identity (`TomlStore`, `MemoryStore`)
//!
//! ### ② Services
//! - `services/` - single-unit capabilities, no flow knowledge
//! - page classifier, response parser, text normalizer, identity normalizer,
//!   answer-key extractor, solver, review writer, section validator
//!
//! ### ③ Workflow
//! - `workflow/` - how one question gets its answer
//! - `ReconcileFlow` - lookup, trust or verify, solve with a retry ladder
//!
//! ### ④ Orchestration
//! - `orchestrator/batch_processor` - the batch, resources and cancellation
//! - `orchestrator/document_processor` - one document, pages then questions

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{MemoryStore, ModelOracle, OpenAiOracle, QuestionStore, RateLimitedOracle, TomlStore};
pub use models::{DocumentInput, PageInput, Provenance, QuestionIdentity, ResolvedAnswer, Section, SectionTable};
pub use orchestrator::{App, BatchSummary, DocumentProcessor, DocumentSummary};
pub use workflow::{FlowResult, QuestionCtx, ReconcileFlow};
