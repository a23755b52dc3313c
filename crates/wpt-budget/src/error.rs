//! Error types for the WebPageTest budget runner
//!
//! Every failure a build step can observe is one of these variants. A budget
//! that is exceeded is not an exception inside the engine; it only becomes
//! [`BudgetError::BudgetExceeded`] at the task boundary so the caller fails
//! the build step with the full report attached.

use thiserror::Error;

/// Main error type for budget runs
#[derive(Error, Debug)]
pub enum BudgetError {
    /// Missing or malformed options, raised before any network activity
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The remote test did not complete within the configured timeout
    #[error(
        "Test {test_id} has timed out. You can still view the results online at {results_url}."
    )]
    RemoteTimeout { test_id: String, results_url: String },

    /// The remote service reported a run-level error
    #[error("Test {test_id} has errored. Error code: {code}.")]
    RemoteExecution { test_id: String, code: i64 },

    /// Failure reaching the remote service
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP success but no successful first-view run
    #[error("Test {test_id} was unable to complete. Please see {summary} for more details.")]
    IncompleteRun { test_id: String, summary: String },

    /// One or more enforced thresholds were exceeded
    #[error("Test for {url} FAILED\n{report}")]
    BudgetExceeded { url: String, report: String },

    /// Writing the raw result artifact failed
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// File access or I/O error
    #[error("File error: {0}")]
    FileError(String),

    /// Options or result file parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Serialization error while rendering output
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BudgetError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        BudgetError::Configuration(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        BudgetError::Transport(msg.into())
    }

    /// Create a file error
    pub fn file_error(msg: impl Into<String>) -> Self {
        BudgetError::FileError(msg.into())
    }

    /// Create a parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        BudgetError::ParseError(msg.into())
    }

    /// Check if this error was caused by the caller's input
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            BudgetError::Configuration(_) | BudgetError::FileError(_) | BudgetError::ParseError(_)
        )
    }

    /// Check if the remote test itself failed (as opposed to the budget)
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            BudgetError::RemoteTimeout { .. }
                | BudgetError::RemoteExecution { .. }
                | BudgetError::IncompleteRun { .. }
        )
    }
}

impl From<std::io::Error> for BudgetError {
    fn from(err: std::io::Error) -> Self {
        BudgetError::FileError(err.to_string())
    }
}

impl From<serde_json::Error> for BudgetError {
    fn from(err: serde_json::Error) -> Self {
        BudgetError::ParseError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for BudgetError {
    fn from(err: serde_yaml::Error) -> Self {
        BudgetError::ParseError(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for BudgetError {
    fn from(err: toml::de::Error) -> Self {
        BudgetError::ParseError(format!("TOML error: {}", err))
    }
}

/// Result type alias for budget operations
pub type Result<T> = std::result::Result<T, BudgetError>;
