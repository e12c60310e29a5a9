pub mod question_ctx;
pub mod reconcile_flow;

pub use question_ctx::QuestionCtx;
pub use reconcile_flow::{FlowResult, ReconcileFlow};
