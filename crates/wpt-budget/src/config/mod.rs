//! Option normalization
//!
//! Turns a raw options object into a fully-defaulted [`RunConfiguration`]
//! and [`BudgetConfiguration`]. Normalization runs once, before any network
//! activity, so the rest of the crate never deals with optional fields.
//!
//! Blank handling: a missing, `null`, empty-string or zero value for a
//! recognized field is replaced by its default. Boolean fields honor an
//! explicit `false`.

pub mod loader;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::metric::{Metric, Threshold};
use crate::error::{BudgetError, Result};

pub use loader::{load_options, merge_overrides, parse_options};

/// Public WebPageTest instance
pub const DEFAULT_INSTANCE: &str = "www.webpagetest.org";
/// Default test location
pub const DEFAULT_LOCATION: &str = "Dulles:Chrome";
/// Default connectivity profile
pub const DEFAULT_CONNECTIVITY: &str = "Cable";
/// Default number of runs
pub const DEFAULT_RUNS: u32 = 1;
/// Default poll interval in seconds
pub const DEFAULT_POLL_SECS: u64 = 5;
/// Default timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// HTTP authentication scheme for the page under test (`authType`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationType {
    /// HTTP Basic authentication
    #[default]
    Basic,
    /// SNS authentication
    Sns,
}

impl AuthenticationType {
    /// Value of the `authType` API parameter
    pub fn code(&self) -> u8 {
        match self {
            AuthenticationType::Basic => 0,
            AuthenticationType::Sns => 1,
        }
    }

    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Number(n) => match n.as_u64() {
                Some(0) => Ok(AuthenticationType::Basic),
                Some(1) => Ok(AuthenticationType::Sns),
                _ => Err(format!("unknown authentication type {}", n)),
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "0" | "basic" => Ok(AuthenticationType::Basic),
                "1" | "sns" => Ok(AuthenticationType::Sns),
                other => Err(format!("unknown authentication type '{}'", other)),
            },
            other => Err(format!("expected 0, 1, \"basic\" or \"sns\", found {}", other)),
        }
    }
}

/// Canonical test-execution parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfiguration {
    /// Page under test
    pub url: String,
    /// API key (`k`)
    #[serde(serialize_with = "redact")]
    pub key: String,
    /// WebPageTest host, with or without scheme
    pub wpt_instance: String,
    /// Test location and browser
    pub location: String,
    /// Connectivity profile
    pub connectivity: String,
    /// Custom profile download bandwidth in Kbps
    pub bandwidth_down: Option<u64>,
    /// Custom profile upload bandwidth in Kbps
    pub bandwidth_up: Option<u64>,
    /// Custom profile first-hop RTT in ms
    pub latency: Option<u64>,
    /// Custom profile packet loss in percent
    pub packet_loss_rate: Option<f64>,
    /// HTTP auth user for the page under test
    pub login: Option<String>,
    /// HTTP auth password for the page under test
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// HTTP auth scheme used with `login`/`password`
    pub authentication_type: AuthenticationType,
    /// Number of test runs
    pub runs: u32,
    /// Skip the repeat view and judge the first view
    pub first_view_only: bool,
    /// Capture video (required for Speed Index)
    pub video: bool,
    /// Poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum wait for completion in milliseconds
    pub timeout_ms: u64,
    /// Where to write the raw result document
    pub output: Option<PathBuf>,
    /// Pretty-print the raw result document
    pub pretty_output: bool,
}

fn redact<S: Serializer>(value: &str, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if value.is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str("********")
    }
}

impl RunConfiguration {
    /// Configuration with every field at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: String::new(),
            wpt_instance: DEFAULT_INSTANCE.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            connectivity: DEFAULT_CONNECTIVITY.to_string(),
            bandwidth_down: None,
            bandwidth_up: None,
            latency: None,
            packet_loss_rate: None,
            login: None,
            password: None,
            authentication_type: AuthenticationType::Basic,
            runs: DEFAULT_RUNS,
            first_view_only: false,
            video: true,
            poll_interval_ms: DEFAULT_POLL_SECS * 1000,
            timeout_ms: DEFAULT_TIMEOUT_SECS * 1000,
            output: None,
            pretty_output: false,
        }
    }

    /// Poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Completion timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Base URL of the WebPageTest instance; https is assumed without a scheme
    pub fn instance_url(&self) -> String {
        let instance = self.wpt_instance.trim_end_matches('/');
        if instance.starts_with("http://") || instance.starts_with("https://") {
            instance.to_string()
        } else {
            format!("https://{}", instance)
        }
    }

    /// Human-readable result page for a test
    pub fn results_url(&self, test_id: &str) -> String {
        format!("{}/results.php?test={}", self.instance_url(), test_id)
    }
}

/// Per-metric thresholds in vocabulary order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfiguration {
    thresholds: BTreeMap<Metric, Threshold>,
    /// Caller keys outside the vocabulary; kept for display, never evaluated
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    unknown: BTreeMap<String, Value>,
}

impl Default for BudgetConfiguration {
    fn default() -> Self {
        Self {
            thresholds: Metric::ALL
                .into_iter()
                .map(|m| (m, Threshold::Unenforced))
                .collect(),
            unknown: BTreeMap::new(),
        }
    }
}

impl BudgetConfiguration {
    /// Budget with every metric unenforced
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a threshold
    pub fn with_threshold(mut self, metric: Metric, threshold: Threshold) -> Self {
        self.thresholds.insert(metric, threshold);
        self
    }

    /// Set an enforced ceiling
    pub fn with_max(self, metric: Metric, max: f64) -> Self {
        self.with_threshold(metric, Threshold::ceiling(max))
    }

    /// Threshold for a metric
    pub fn threshold(&self, metric: Metric) -> Threshold {
        self.thresholds.get(&metric).copied().unwrap_or_default()
    }

    /// Thresholds in vocabulary order
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Threshold)> + '_ {
        Metric::ALL.into_iter().map(move |m| (m, self.threshold(m)))
    }

    /// Number of enforced thresholds
    pub fn enforced_count(&self) -> usize {
        self.thresholds.values().filter(|t| t.is_enforced()).count()
    }

    /// Keys outside the vocabulary
    pub fn unknown(&self) -> &BTreeMap<String, Value> {
        &self.unknown
    }
}

/// Normalize raw options into canonical run and budget configurations.
///
/// The input is only read. Fails when the options are absent, not an
/// object, lack a `url`, or hold a recognized field that cannot be coerced
/// to its type.
pub fn normalize(raw: Option<&Value>) -> Result<(RunConfiguration, BudgetConfiguration)> {
    let options = match raw {
        None | Some(Value::Null) => {
            return Err(BudgetError::configuration(
                "options are mandatory when running a budget test",
            ))
        }
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(BudgetError::configuration(format!(
                "options must be an object, found {}",
                type_name(other)
            )))
        }
    };

    let url = match options.get("url") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            return Err(BudgetError::configuration("missing options.url property"))
        }
        Some(other) => {
            return Err(BudgetError::configuration(format!(
                "options.url must be a string, found {}",
                type_name(other)
            )))
        }
    };

    let defaults = RunConfiguration::new(url.clone());
    let fields = Fields(options);

    let run = RunConfiguration {
        url,
        key: fields.secret("key")?.unwrap_or(defaults.key),
        wpt_instance: fields.string("wptInstance")?.unwrap_or(defaults.wpt_instance),
        location: fields.string("location")?.unwrap_or(defaults.location),
        connectivity: fields.string("connectivity")?.unwrap_or(defaults.connectivity),
        bandwidth_down: fields.unsigned("bandwidthDown")?,
        bandwidth_up: fields.unsigned("bandwidthUp")?,
        latency: fields.unsigned("latency")?,
        packet_loss_rate: fields.float("packetLossRate")?,
        login: fields.string("login")?,
        password: fields.secret("password")?,
        authentication_type: fields
            .get("authenticationType")
            .map(|v| {
                AuthenticationType::from_value(v)
                    .map_err(|e| BudgetError::configuration(format!("options.authenticationType: {}", e)))
            })
            .transpose()?
            .unwrap_or_default(),
        runs: match fields.unsigned("runs")? {
            Some(runs) => u32::try_from(runs)
                .map_err(|_| BudgetError::configuration("options.runs is out of range"))?,
            None => defaults.runs,
        },
        first_view_only: fields.boolean("firstViewOnly")?.unwrap_or(defaults.first_view_only),
        video: fields.boolean("video")?.unwrap_or(defaults.video),
        poll_interval_ms: fields
            .unsigned("pollResults")?
            .map(|s| s.saturating_mul(1000))
            .unwrap_or(defaults.poll_interval_ms),
        timeout_ms: fields
            .unsigned("timeout")?
            .map(|s| s.saturating_mul(1000))
            .unwrap_or(defaults.timeout_ms),
        output: fields.string("output")?.map(PathBuf::from),
        pretty_output: fields.boolean("prettyOutput")?.unwrap_or(defaults.pretty_output),
    };

    let budget = normalize_budget(options.get("budget"))?;

    tracing::debug!(
        url = %run.url,
        instance = %run.wpt_instance,
        runs = run.runs,
        first_view_only = run.first_view_only,
        enforced = budget.enforced_count(),
        "Normalized options"
    );

    Ok((run, budget))
}

fn normalize_budget(raw: Option<&Value>) -> Result<BudgetConfiguration> {
    let map = match raw {
        None => return Ok(BudgetConfiguration::new()),
        Some(value) if is_blank(value) => return Ok(BudgetConfiguration::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(BudgetError::configuration(format!(
                "options.budget must be an object, found {}",
                type_name(other)
            )))
        }
    };

    let mut budget = BudgetConfiguration::new();

    for metric in Metric::ALL {
        let value = map.get(metric.config_key()).or_else(|| {
            (metric == Metric::SpeedIndex)
                .then(|| map.get("SpeedIndex"))
                .flatten()
        });
        if let Some(value) = value {
            let threshold = Threshold::from_value(value).map_err(|e| {
                BudgetError::configuration(format!("options.budget.{}: {}", metric, e))
            })?;
            budget.thresholds.insert(metric, threshold);
        }
    }

    for (key, value) in map {
        if Metric::from_config_key(key).is_none() {
            tracing::debug!(key = %key, "Ignoring unknown budget metric");
            budget.unknown.insert(key.clone(), value.clone());
        }
    }

    Ok(budget)
}

/// Typed, blank-aware accessors over a raw options object
struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    /// The value for a key, or `None` when it is blank
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.0.get(key).filter(|v| !is_blank(v))
    }

    fn string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    /// Credentials are passed through untrimmed
    fn secret(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    fn unsigned(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
                .map(Some)
                .ok_or_else(|| wrong_type(key, "a non-negative integer", &Value::Number(n.clone()))),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(|v| (v != 0).then_some(v))
                .map_err(|_| wrong_type(key, "a non-negative integer", &Value::String(s.clone()))),
            Some(other) => Err(wrong_type(key, "a non-negative integer", other)),
        }
    }

    fn float(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(|v| (v != 0.0).then_some(v))
                .map_err(|_| wrong_type(key, "a number", &Value::String(s.clone()))),
            Some(other) => Err(wrong_type(key, "a number", other)),
        }
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>> {
        let value = match self.0.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
            Some(v) => v,
        };
        match value {
            Value::Bool(b) => Ok(Some(*b)),
            Value::Number(n) => match n.as_u64() {
                Some(0) => Ok(Some(false)),
                Some(1) => Ok(Some(true)),
                _ => Err(wrong_type(key, "a boolean", value)),
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Some(true)),
                "false" | "0" | "no" => Ok(Some(false)),
                _ => Err(wrong_type(key, "a boolean", value)),
            },
            other => Err(wrong_type(key, "a boolean", other)),
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.trim().is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn wrong_type(key: &str, expected: &str, found: &Value) -> BudgetError {
    BudgetError::configuration(format!(
        "options.{} must be {}, found {}",
        key,
        expected,
        type_name(found)
    ))
}

fn type_name(value: &Value) -> TypeName<'_> {
    TypeName(value)
}

struct TypeName<'a>(&'a Value);

impl fmt::Display for TypeName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Null => f.write_str("null"),
            Value::Bool(_) => f.write_str("a boolean"),
            Value::Number(_) => f.write_str("a number"),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(_) => f.write_str("an array"),
            Value::Object(_) => f.write_str("an object"),
        }
    }
}
