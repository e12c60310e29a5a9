//! Services layer
//!
//! Single-unit capabilities. Nothing here knows about documents or batches.

pub mod answer_key_extractor;
pub mod identity_normalizer;
pub mod page_classifier;
pub mod prompts;
pub mod response_parser;
pub mod review_writer;
pub mod solver;
pub mod text_normalizer;
pub mod validator;

pub use answer_key_extractor::{extract_answer_key, normalize_mcq_answer};
pub use identity_normalizer::{normalize_all, normalize_identity, IdentityConflict, IdentityRegistry};
pub use page_classifier::{classify_page, page_signal};
pub use response_parser::parse_page_response;
pub use review_writer::{ReviewReason, ReviewWriter};
pub use solver::{pick_part_answer, SolvedAnswer, Solver, Verdict, Verification};
pub use text_normalizer::normalize_text;
pub use validator::{validate_section_counts, ValidationWarning};
