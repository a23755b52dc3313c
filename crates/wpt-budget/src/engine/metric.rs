//! Budget metric vocabulary
//!
//! The set of metrics a budget can constrain is fixed. Budget keys outside
//! this vocabulary are kept by the normalizer but never evaluated.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A WebPageTest median metric that a budget can constrain.
///
/// Declaration order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// Bytes downloaded until the page was fully loaded
    #[serde(rename = "bytesIn")]
    BytesIn,
    /// Bytes downloaded until the document was complete
    #[serde(rename = "bytesInDoc")]
    BytesInDoc,
    /// Document complete time (ms)
    #[serde(rename = "docTime")]
    DocTime,
    /// Fully loaded time (ms)
    #[serde(rename = "fullyLoaded")]
    FullyLoaded,
    /// Load event time (ms)
    #[serde(rename = "loadTime")]
    LoadTime,
    /// Start render time (ms)
    #[serde(rename = "render")]
    Render,
    /// Request count until fully loaded
    #[serde(rename = "requests")]
    Requests,
    /// Request count until document complete
    #[serde(rename = "requestsDoc")]
    RequestsDoc,
    /// Speed Index (requires video capture)
    #[serde(rename = "speedIndex", alias = "SpeedIndex")]
    SpeedIndex,
    /// Visually complete time (ms)
    #[serde(rename = "visualComplete")]
    VisualComplete,
}

impl Metric {
    /// Every metric, in report order
    pub const ALL: [Metric; 10] = [
        Metric::BytesIn,
        Metric::BytesInDoc,
        Metric::DocTime,
        Metric::FullyLoaded,
        Metric::LoadTime,
        Metric::Render,
        Metric::Requests,
        Metric::RequestsDoc,
        Metric::SpeedIndex,
        Metric::VisualComplete,
    ];

    /// Key used in budget options
    pub fn config_key(&self) -> &'static str {
        match self {
            Metric::BytesIn => "bytesIn",
            Metric::BytesInDoc => "bytesInDoc",
            Metric::DocTime => "docTime",
            Metric::FullyLoaded => "fullyLoaded",
            Metric::LoadTime => "loadTime",
            Metric::Render => "render",
            Metric::Requests => "requests",
            Metric::RequestsDoc => "requestsDoc",
            Metric::SpeedIndex => "speedIndex",
            Metric::VisualComplete => "visualComplete",
        }
    }

    /// Keys to look up in a median record, most specific first
    pub fn payload_keys(&self) -> &'static [&'static str] {
        match self {
            Metric::SpeedIndex => &["SpeedIndex", "speedIndex"],
            Metric::BytesIn => &["bytesIn"],
            Metric::BytesInDoc => &["bytesInDoc"],
            Metric::DocTime => &["docTime"],
            Metric::FullyLoaded => &["fullyLoaded"],
            Metric::LoadTime => &["loadTime"],
            Metric::Render => &["render"],
            Metric::Requests => &["requests"],
            Metric::RequestsDoc => &["requestsDoc"],
            Metric::VisualComplete => &["visualComplete"],
        }
    }

    /// Resolve a budget option key, accepting the legacy `SpeedIndex` spelling
    pub fn from_config_key(key: &str) -> Option<Metric> {
        if key == "SpeedIndex" {
            return Some(Metric::SpeedIndex);
        }
        Metric::ALL.into_iter().find(|m| m.config_key() == key)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// A budget ceiling for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "max", rename_all = "snake_case")]
pub enum Threshold {
    /// Reported but not judged
    #[default]
    Unenforced,
    /// Observed values above this fail
    Max(f64),
}

impl Threshold {
    /// Parse a raw budget option value.
    ///
    /// `null`, `false`, `""` and `0` (number or string) are unenforced.
    pub fn from_value(value: &serde_json::Value) -> Result<Threshold, String> {
        use serde_json::Value;

        match value {
            Value::Null | Value::Bool(false) => Ok(Threshold::Unenforced),
            Value::Number(n) => match n.as_f64() {
                Some(v) => Ok(Threshold::ceiling(v)),
                None => Err(format!("{} is not a representable number", n)),
            },
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(Threshold::Unenforced);
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Threshold::ceiling)
                    .ok_or_else(|| format!("'{}' is not a number", s))
            }
            Value::Bool(true) => Err("expected a number, found true".to_string()),
            Value::Array(_) => Err("expected a number, found an array".to_string()),
            Value::Object(_) => Err("expected a number, found an object".to_string()),
        }
    }

    /// Ceiling from a number; zero is unenforced
    pub fn ceiling(v: f64) -> Threshold {
        if v == 0.0 || !v.is_finite() {
            Threshold::Unenforced
        } else {
            Threshold::Max(v)
        }
    }

    /// Whether this threshold is judged
    pub fn is_enforced(&self) -> bool {
        matches!(self, Threshold::Max(_))
    }

    /// The ceiling, if enforced
    pub fn limit(&self) -> Option<f64> {
        match self {
            Threshold::Max(v) => Some(*v),
            Threshold::Unenforced => None,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Unenforced => f.write_str("unenforced"),
            Threshold::Max(v) => f.write_str(&format_number(*v)),
        }
    }
}

/// Format a number without a trailing `.0` for whole values
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
