//! Remote test lifecycle
//!
//! A remote test moves `Submitted -> Polling` and ends in exactly one of four
//! terminal states. Only a completed test with at least one successful
//! first-view run is handed to the budget engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::MetricsResult;
use crate::error::BudgetError;

/// Lifecycle state of a remote test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestState {
    Submitted,
    Polling,
    Completed,
    TimedOut,
    RemoteError,
    TransportError,
}

impl TestState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TestState::Submitted | TestState::Polling)
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestState::Submitted => "submitted",
            TestState::Polling => "polling",
            TestState::Completed => "completed",
            TestState::TimedOut => "timed_out",
            TestState::RemoteError => "remote_error",
            TestState::TransportError => "transport_error",
        };
        f.write_str(s)
    }
}

/// A finished test together with its raw payload
#[derive(Debug, Clone)]
pub struct CompletedTest {
    /// Typed view of the result document
    pub result: MetricsResult,
    /// The document exactly as received, for the output artifact
    pub raw: serde_json::Value,
    /// When the result was fetched
    pub completed_at: DateTime<Utc>,
}

impl CompletedTest {
    /// Build from a raw result document
    pub fn from_raw(raw: serde_json::Value) -> Result<Self, BudgetError> {
        let result: MetricsResult = serde_json::from_value(raw.clone())
            .map_err(|e| BudgetError::parse_error(format!("result document: {}", e)))?;
        Ok(Self {
            result,
            raw,
            completed_at: Utc::now(),
        })
    }

    /// Test identifier
    pub fn test_id(&self) -> &str {
        &self.result.data.id
    }
}

/// Terminal outcome of a remote test
#[derive(Debug, Clone)]
pub enum TestOutcome {
    /// The service reported completion
    Completed(Box<CompletedTest>),
    /// The configured timeout elapsed first
    TimedOut { test_id: String, results_url: String },
    /// The service reported a run-level error
    RemoteError { test_id: String, code: i64 },
    /// The service could not be reached or answered unexpectedly
    TransportError { message: String },
}

impl TestOutcome {
    /// The terminal state this outcome represents
    pub fn state(&self) -> TestState {
        match self {
            TestOutcome::Completed(_) => TestState::Completed,
            TestOutcome::TimedOut { .. } => TestState::TimedOut,
            TestOutcome::RemoteError { .. } => TestState::RemoteError,
            TestOutcome::TransportError { .. } => TestState::TransportError,
        }
    }

    /// Accept only a completed test with a successful first-view run.
    ///
    /// Every other outcome becomes the matching error; a completed document
    /// whose status code is not 200 is reported with its status text.
    pub fn into_completed(self) -> Result<CompletedTest, BudgetError> {
        match self {
            TestOutcome::Completed(test) => {
                if !test.result.is_complete() {
                    let text = if test.result.status_text.is_empty() {
                        format!("Unexpected status code {}", test.result.status_code)
                    } else {
                        test.result.status_text.clone()
                    };
                    return Err(BudgetError::Transport(text));
                }
                if test.result.data.successful_fv_runs <= 0 {
                    return Err(BudgetError::IncompleteRun {
                        test_id: test.result.data.id.clone(),
                        summary: test.result.data.summary.clone(),
                    });
                }
                Ok(*test)
            }
            TestOutcome::TimedOut {
                test_id,
                results_url,
            } => Err(BudgetError::RemoteTimeout {
                test_id,
                results_url,
            }),
            TestOutcome::RemoteError { test_id, code } => {
                Err(BudgetError::RemoteExecution { test_id, code })
            }
            TestOutcome::TransportError { message } => Err(BudgetError::Transport(message)),
        }
    }
}
