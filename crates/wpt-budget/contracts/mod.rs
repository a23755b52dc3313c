//! WebPageTest payload contracts
//!
//! Shapes of the JSON documents exchanged with a WebPageTest instance and
//! the terminal outcomes of a remote test.
//!
//! # Design Principles
//!
//! - **Read-only**: payloads are never modified after they are received
//! - **Lenient**: unknown fields are ignored, missing counters default to zero
//! - **Open records**: median records stay string-keyed JSON so the metric
//!   vocabulary can grow without touching the wire types

pub mod outcome;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub use outcome::{CompletedTest, TestOutcome, TestState};

/// HTTP-level status code WebPageTest uses for "complete"
pub const STATUS_COMPLETE: i64 = 200;

/// A per-metric median record (`median.firstView` / `median.repeatView`)
pub type MetricRecord = Map<String, Value>;

/// Which median record a verdict judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum View {
    /// Uncached page load
    FirstView,
    /// Cache-warmed repeat load
    RepeatView,
}

impl View {
    /// Select the view judged for a run
    pub fn for_run(first_view_only: bool) -> Self {
        if first_view_only {
            View::FirstView
        } else {
            View::RepeatView
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::FirstView => write!(f, "first view"),
            View::RepeatView => write!(f, "repeat view"),
        }
    }
}

/// Result document returned by `jsonResult.php`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResult {
    /// WebPageTest status code (200 = complete)
    #[serde(rename = "statusCode")]
    pub status_code: i64,

    /// Human-readable status
    #[serde(rename = "statusText", default)]
    pub status_text: String,

    /// Test data
    #[serde(default)]
    pub data: TestData,
}

impl MetricsResult {
    /// Median record for a view, if the remote service reported one
    pub fn median(&self, view: View) -> Option<&MetricRecord> {
        match view {
            View::FirstView => self.data.median.first_view.as_ref(),
            View::RepeatView => self.data.median.repeat_view.as_ref(),
        }
    }

    /// Whether the remote service reported completion
    pub fn is_complete(&self) -> bool {
        self.status_code == STATUS_COMPLETE
    }
}

/// The `data` section of a result document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestData {
    /// Test identifier
    #[serde(alias = "testId", default)]
    pub id: String,

    /// Tested URL as reported by the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Link to the human-readable result page
    #[serde(default)]
    pub summary: String,

    /// Successful first-view runs
    #[serde(rename = "successfulFVRuns", default)]
    pub successful_fv_runs: i64,

    /// Successful repeat-view runs
    #[serde(rename = "successfulRVRuns", default)]
    pub successful_rv_runs: i64,

    /// Median records per view
    #[serde(default)]
    pub median: MedianRecords,
}

/// Median records per view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedianRecords {
    #[serde(rename = "firstView", default, skip_serializing_if = "Option::is_none")]
    pub first_view: Option<MetricRecord>,

    #[serde(rename = "repeatView", default, skip_serializing_if = "Option::is_none")]
    pub repeat_view: Option<MetricRecord>,
}

/// Response of `runtest.php?f=json`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    #[serde(rename = "statusCode")]
    pub status_code: i64,

    #[serde(rename = "statusText", default)]
    pub status_text: String,

    #[serde(default)]
    pub data: Option<SubmitData>,
}

/// `data` section of a submit response
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitData {
    #[serde(rename = "testId")]
    pub test_id: String,

    #[serde(rename = "userUrl", default)]
    pub user_url: Option<String>,

    #[serde(rename = "jsonUrl", default)]
    pub json_url: Option<String>,
}

/// Response of `testStatus.php?f=json`
///
/// 1xx codes mean queued or running, 200 complete, 4xx a run-level error.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "statusCode")]
    pub status_code: i64,

    #[serde(rename = "statusText", default)]
    pub status_text: String,
}

impl StatusResponse {
    /// Queued or running
    pub fn is_pending(&self) -> bool {
        (100..200).contains(&self.status_code)
    }

    /// Finished
    pub fn is_complete(&self) -> bool {
        self.status_code == STATUS_COMPLETE
    }
}
