//! Infrastructure layer
//!
//! Owns the scarce external resources and only exposes capabilities.

pub mod memory_store;
pub mod openai_oracle;
pub mod oracle;
pub mod store;
pub mod toml_store;

pub use memory_store::MemoryStore;
pub use openai_oracle::OpenAiOracle;
pub use oracle::{ModelOracle, RateLimitedOracle};
pub use store::{AnswerFields, QuestionFields, QuestionRecord, QuestionStore, RecordFilter, UpsertOutcome};
pub use toml_store::TomlStore;
