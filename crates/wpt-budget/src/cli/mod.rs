//! CLI module for the budget runner
//!
//! Runs budget tests against WebPageTest, evaluates saved results offline
//! and prints the normalized configuration.

pub mod commands;
pub mod output;

pub use commands::{BudgetCli, BudgetCommands, OverrideArgs};
pub use output::{ConfigOutput, OutputFormat, VerdictOutput};

use crate::error::{BudgetError, Result};

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum ExitCode {
    /// Every enforced metric passed
    Success = 0,
    /// At least one enforced metric failed
    BudgetExceeded = 1,
    /// Invalid options or arguments
    InvalidInput = 3,
    /// File not found, unreadable or not writable
    FileError = 4,
    /// The remote test timed out, errored or did not complete a run
    RemoteFailure = 5,
    /// The WebPageTest instance could not be reached
    TransportError = 6,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Exit code for an error
    pub fn from_error(err: &BudgetError) -> Self {
        match err {
            BudgetError::BudgetExceeded { .. } => ExitCode::BudgetExceeded,
            BudgetError::FileError(_) | BudgetError::Artifact(_) => ExitCode::FileError,
            BudgetError::Transport(_) => ExitCode::TransportError,
            e if e.is_user_error() => ExitCode::InvalidInput,
            e if e.is_remote_failure() => ExitCode::RemoteFailure,
            _ => ExitCode::InternalError,
        }
    }

    /// Exit code for a verdict
    pub fn from_verdict(passed: bool) -> Self {
        if passed {
            ExitCode::Success
        } else {
            ExitCode::BudgetExceeded
        }
    }
}

/// Run the CLI with the given arguments and return the exit code
pub async fn run(cli: BudgetCli) -> Result<ExitCode> {
    match cli.command {
        BudgetCommands::Run {
            options,
            urls,
            overrides,
            format,
        } => commands::execute_run(options, urls, overrides, format).await,
        BudgetCommands::Evaluate {
            options,
            result,
            overrides,
            format,
        } => commands::execute_evaluate(options, result, overrides, format),
        BudgetCommands::Config {
            options,
            overrides,
            format,
        } => commands::execute_config(options, overrides, format),
    }
}
