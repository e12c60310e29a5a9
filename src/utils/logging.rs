//! Logging utilities
//!
//! Subscriber setup, the run log file, and the formatting helpers used by
//! the orchestrator.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` when verbose.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // a second init (tests, embedding) is harmless
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Start the run log with a timestamped header
///
/// # Arguments
/// - `log_file_path`: run log path, truncated
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\nQuestion bank run - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("failed to write run log {}", log_file_path))?;
    Ok(())
}

/// Append lines to the run log
pub fn append_to_log_file(log_file_path: &str, lines: &[String]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("failed to open run log {}", log_file_path))?;
    for line in lines {
        writeln!(file, "{}", line)
            .with_context(|| format!("failed to append to run log {}", log_file_path))?;
    }
    Ok(())
}

// ========== Logging helpers ==========

pub fn log_startup(model_name: &str, min_interval_ms: u64, verify_candidates: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 Starting question bank recovery");
    info!("📊 Model: {} | min interval: {} ms", model_name, min_interval_ms);
    info!(
        "📋 Candidate policy: {}",
        if verify_candidates { "verify" } else { "trust" }
    );
    info!("{}", "=".repeat(60));
}

pub fn log_documents_loaded(total: usize) {
    info!("✓ Found {} document(s) to process", total);
    info!("💡 Pages and questions run strictly one at a time\n");
}

pub fn log_document_start(index: usize, total: usize, name: &str, pages: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 Document {}/{}: {}", index, total, name);
    info!("📄 Pages: {}", pages);
    info!("{}", "=".repeat(60));
}

/// Shorten long text for log display
///
/// # Returns
/// At most `max_len` characters, with `...` appended when cut
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("Find the value of x", 8), "Find the...");
        assert_eq!(truncate_text("角度是多少度", 2), "角度...");
    }

    #[test]
    fn test_log_file_header_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let path = path.to_string_lossy().to_string();

        init_log_file(&path).unwrap();
        append_to_log_file(&path, &["documents: 2".to_string(), "failed: 1".to_string()]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&"=".repeat(60)));
        assert!(content.contains("Question bank run - "));
        assert!(content.ends_with("documents: 2\nfailed: 1\n"));
    }
}
