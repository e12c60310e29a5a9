use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::section::SectionTable;

/// Program configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Folder holding one TOML manifest per document
    pub documents_folder: String,
    /// TOML question bank
    pub bank_file: String,
    /// Lines for human review (failed, low-confidence, conflicting questions)
    pub review_file: String,
    /// Run log with header and final summary
    pub output_log_file: String,
    pub verbose_logging: bool,
    // --- LLM ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_tokens: u32,
    /// Minimum delay between two oracle calls
    pub min_request_interval_ms: u64,
    // --- Reconciliation ---
    /// Long-answer solve attempts before the lenient prompt
    pub solve_max_attempts: u32,
    pub solve_backoff_ms: u64,
    /// Allow re-runs to replace stored non-empty answers
    pub overwrite_answers: bool,
    /// Verify answer-key candidates against an independent solve instead of trusting them
    pub verify_candidates: bool,
    pub sections: SectionTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents_folder: "documents".to_string(),
            bank_file: "question_bank.toml".to_string(),
            review_file: "review.txt".to_string(),
            output_log_file: "output.txt".to_string(),
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            llm_max_tokens: 8192,
            // 15 requests per minute
            min_request_interval_ms: 4000,
            solve_max_attempts: 3,
            solve_backoff_ms: 2000,
            overwrite_answers: false,
            verify_candidates: false,
            sections: SectionTable::standard(),
        }
    }
}

impl Config {
    /// Read the environment, logging malformed values
    pub fn from_env() -> Self {
        let (config, problems) = Self::from_env_checked();
        for problem in &problems {
            tracing::warn!("⚠️ {}, using default", problem);
        }
        config
    }

    /// Read the environment
    ///
    /// # Returns
    /// The config plus one error per malformed variable; those fields keep
    /// their defaults. Callers log the errors once tracing is up.
    pub fn from_env_checked() -> (Self, Vec<ConfigError>) {
        let default = Self::default();
        let mut env = EnvReader::default();
        let config = Self {
            documents_folder: std::env::var("DOCUMENTS_FOLDER").unwrap_or(default.documents_folder),
            bank_file: std::env::var("BANK_FILE").unwrap_or(default.bank_file),
            review_file: std::env::var("REVIEW_FILE").unwrap_or(default.review_file),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: env.typed("VERBOSE_LOGGING", default.verbose_logging),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_max_tokens: env.typed("LLM_MAX_TOKENS", default.llm_max_tokens),
            min_request_interval_ms: env
                .typed("MIN_REQUEST_INTERVAL_MS", default.min_request_interval_ms),
            solve_max_attempts: env.typed("SOLVE_MAX_ATTEMPTS", default.solve_max_attempts).max(1),
            solve_backoff_ms: env.typed("SOLVE_BACKOFF_MS", default.solve_backoff_ms),
            overwrite_answers: env.typed("OVERWRITE_ANSWERS", default.overwrite_answers),
            verify_candidates: env.typed("VERIFY_CANDIDATES", default.verify_candidates),
            sections: default.sections,
        };
        (config, env.problems)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn solve_backoff(&self) -> Duration {
        Duration::from_millis(self.solve_backoff_ms)
    }
}

/// Parse a typed value
fn parse_value<T: FromStr>(var_name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: std::any::type_name::<T>().to_string(),
        })
}

/// Typed env lookups that collect malformed values instead of logging them
#[derive(Debug, Default)]
struct EnvReader {
    problems: Vec<ConfigError>,
}

impl EnvReader {
    /// The parsed value, or `default` when unset or malformed
    fn typed<T: FromStr>(&mut self, var_name: &str, default: T) -> T {
        let Ok(value) = std::env::var(var_name) else {
            return default;
        };
        match parse_value(var_name, &value) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.problems.push(e);
                default
            }
        }
    }
}
