pub mod logging;

pub use logging::{init_log_file, init_tracing, truncate_text};
