//! Orchestration layer
//!
//! ## Modules
//!
//! ### `batch_processor` - the batch
//! - owns the application lifecycle and the only oracle/store construction
//! - loads document manifests, processes them in order
//! - cancellation flag and the final summary
//!
//! ### `document_processor` - one document
//! - pages in order, then identities, validation and reconciliation
//! - per-document summary
//!
//! ## Layering
//!
//! ```text
//! batch_processor (Vec<DocumentInput>)
//!     ↓
//! document_processor (pages, then Vec<NormalizedQuestion>)
//!     ↓
//! workflow::ReconcileFlow (one question)
//!     ↓
//! services (classify / parse / normalize / extract / solve / review)
//!     ↓
//! infrastructure (ModelOracle, QuestionStore)
//! ```

pub mod batch_processor;
pub mod document_processor;

pub use batch_processor::{App, BatchSummary};
pub use document_processor::{DocumentProcessor, DocumentSummary, ResolutionCounts};
