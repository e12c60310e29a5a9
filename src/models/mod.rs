pub mod answer_key;
pub mod document;
pub mod loaders;
pub mod question;
pub mod section;

pub use answer_key::{keyspace_key, AnswerKey, CandidateAnswer};
pub use document::{DocumentInput, ImageSource, PageImage, PageInput, PageSignal};
pub use loaders::{load_all_manifests, load_document_manifest};
pub use question::{NormalizedQuestion, Provenance, QuestionDraft, QuestionIdentity, ResolvedAnswer};
pub use section::{MarkRange, PageRole, Section, SectionSpec, SectionTable};
