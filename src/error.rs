use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Model oracle errors
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),
    /// Structured extraction yielded nothing usable
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    /// Persistence errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// File errors
    #[error("file error: {0}")]
    File(#[from] FileError),
    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Anything else (wrapped third-party errors)
    #[error("error: {0}")]
    Other(String),
}

/// Model oracle errors
///
/// The core treats every variant the same way: retryable in the SOLVE state,
/// a skip everywhere else.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The request could not be built
    #[error("failed to build oracle request: {message}")]
    RequestBuildFailed { message: String },
    /// The call itself failed (network, HTTP status, quota)
    #[error("oracle call failed (model: {model}): {source}")]
    RequestFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The oracle answered without any choices
    #[error("oracle returned no choices (model: {model})")]
    EmptyResponse { model: String },
    /// The oracle answered with empty content
    #[error("oracle returned empty content (model: {model})")]
    EmptyContent { model: String },
    /// No answer within the deadline
    #[error("oracle call timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Parse errors
#[derive(Debug, Error)]
pub enum ParseError {
    /// No JSON object could be recovered from an answer-key response
    #[error("no answer-key object found in response ({length} chars)")]
    NoAnswerObject { length: usize },
    /// The recovered object was not a flat string map
    #[error("answer-key object is not a flat map: {reason}")]
    NotAFlatMap { reason: String },
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading the bank failed
    #[error("failed to read bank ({path}): {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },
    /// Writing the bank failed
    #[error("failed to write bank ({path}): {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },
    /// The bank file is not valid TOML for our schema
    #[error("failed to decode bank ({path}): {source}")]
    DecodeFailed {
        path: String,
        source: toml::de::Error,
    },
    /// The bank could not be encoded
    #[error("failed to encode bank: {0}")]
    EncodeFailed(#[from] toml::ser::Error),
}

/// File errors
#[derive(Debug, Error)]
pub enum FileError {
    /// Reading failed
    #[error("failed to read file ({path}): {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },
    /// Writing failed
    #[error("failed to write file ({path}): {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value of the wrong type
    #[error("env var {var_name}: '{value}' is not a valid {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// The section table is internally inconsistent
    #[error("invalid section table for {section}: {reason}")]
    InvalidSectionTable { section: String, reason: String },
}

// ========== Conversions from common error types ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(ParseError::NotAFlatMap {
            reason: err.to_string(),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

// ========== Convenience constructors ==========

impl AppError {
    /// File could not be read
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// File could not be written
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// Section table is inconsistent
    pub fn invalid_section(section: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidSectionTable {
            section: section.into(),
            reason: reason.into(),
        })
    }
}

// ========== Result alias ==========

/// Application result type
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_error_wraps_into_app_error() {
        let err: AppError = OracleError::Timeout { seconds: 30 }.into();
        assert!(matches!(err, AppError::Oracle(OracleError::Timeout { .. })));
        assert_eq!(err.to_string(), "oracle error: oracle call timed out after 30s");
    }

    #[test]
    fn test_invalid_section_constructor() {
        let err = AppError::invalid_section("P1B", "gap after 5");
        assert_eq!(
            err.to_string(),
            "config error: invalid section table for P1B: gap after 5"
        );
    }
}
