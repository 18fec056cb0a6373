//! Error types for the content guard

use thiserror::Error;

/// Infrastructure error type.
///
/// Raised only by constructors and configuration loading. Hostile content
/// never produces a `GuardError`; it produces a failed validation result.
#[derive(Error, Debug)]
pub enum GuardError {
    /// A built-in detection pattern failed to compile
    #[error("pattern compile error in {rule}: {reason}")]
    PatternCompile {
        /// Rule name
        rule: String,
        /// Compiler message
        reason: String,
    },

    /// Invalid configuration value
    #[error("config error: {0}")]
    ConfigError(String),

    /// Configuration could not be parsed
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for guard infrastructure
pub type GuardResult<T> = Result<T, GuardError>;
