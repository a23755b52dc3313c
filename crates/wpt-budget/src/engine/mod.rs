//! Budget evaluation engine
//!
//! Compares one median record of a completed test against a budget and
//! produces an [`EvaluationVerdict`]. Evaluation is a total, deterministic
//! function: missing or extra metrics never make it error, and the same
//! inputs always yield the same verdict and report.

pub mod metric;
pub mod report;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::config::{BudgetConfiguration, RunConfiguration};
use crate::contracts::{MetricRecord, MetricsResult, View};
use metric::{Metric, Threshold};

/// Outcome for a single metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricStatus {
    /// Observed value within the threshold
    Pass,
    /// Observed value above the threshold, or missing while enforced
    Fail,
    /// Not judged
    Skipped,
}

impl fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricStatus::Pass => write!(f, "PASS"),
            MetricStatus::Fail => write!(f, "FAIL"),
            MetricStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Value reported for a metric in the judged record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Observed {
    /// Not present (or `null`)
    Absent,
    /// A plain JSON number
    Number(serde_json::Number),
    /// Present but not comparable, e.g. the per-request array
    NonNumeric(Value),
}

impl Observed {
    /// Look a metric up in a median record
    pub fn lookup(record: &MetricRecord, metric: Metric) -> Self {
        let value = metric
            .payload_keys()
            .iter()
            .find_map(|key| record.get(*key).filter(|v| !v.is_null()));

        match value {
            None => Observed::Absent,
            Some(Value::Number(n)) => Observed::Number(n.clone()),
            Some(other) => Observed::NonNumeric(other.clone()),
        }
    }

    /// Numeric value, if comparable
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Observed::Number(n) => n.as_f64(),
            _ => None,
        }
    }
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Absent => f.write_str("n/a"),
            Observed::Number(n) => write!(f, "{}", n),
            Observed::NonNumeric(_) => f.write_str("(non-numeric)"),
        }
    }
}

/// Verdict for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricVerdict {
    pub metric: Metric,
    pub observed: Observed,
    pub threshold: Threshold,
    pub status: MetricStatus,
}

/// Result of evaluating a completed test against a budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    /// No enforced metric failed
    pub passed: bool,
    /// Page under test
    pub url: String,
    /// Median record that was judged
    pub view: View,
    /// Per-metric verdicts in vocabulary order
    pub metrics: Vec<MetricVerdict>,
    /// Remote summary link
    pub summary: String,
    /// Rendered plain-text report
    pub report: String,
}

impl EvaluationVerdict {
    /// Metrics that failed
    pub fn failures(&self) -> impl Iterator<Item = &MetricVerdict> {
        self.metrics.iter().filter(|m| m.status == MetricStatus::Fail)
    }

    /// Number of metrics with the given status
    pub fn count(&self, status: MetricStatus) -> usize {
        self.metrics.iter().filter(|m| m.status == status).count()
    }

    /// Verdict for one metric
    pub fn metric(&self, metric: Metric) -> Option<&MetricVerdict> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Classify one metric.
///
/// Unenforced and non-numeric observations are skipped; an enforced metric
/// that is absent fails.
pub fn classify(threshold: Threshold, observed: &Observed) -> MetricStatus {
    let Some(limit) = threshold.limit() else {
        return MetricStatus::Skipped;
    };

    match observed {
        Observed::Absent => MetricStatus::Fail,
        Observed::NonNumeric(_) => MetricStatus::Skipped,
        Observed::Number(_) => match observed.as_f64() {
            Some(value) if value > limit => MetricStatus::Fail,
            Some(_) => MetricStatus::Pass,
            None => MetricStatus::Skipped,
        },
    }
}

/// Evaluate a completed test against a budget.
///
/// The judged record is the first view when `first_view_only` is set and
/// the repeat view otherwise. A missing record is judged as empty.
pub fn evaluate(
    run: &RunConfiguration,
    budget: &BudgetConfiguration,
    result: &MetricsResult,
) -> EvaluationVerdict {
    let view = View::for_run(run.first_view_only);
    let empty = MetricRecord::new();
    let record = match result.median(view) {
        Some(record) => record,
        None => {
            tracing::warn!(test_id = %result.data.id, view = %view, "Result has no median record for judged view");
            &empty
        }
    };

    let metrics: Vec<MetricVerdict> = budget
        .iter()
        .map(|(metric, threshold)| {
            let observed = Observed::lookup(record, metric);
            let status = classify(threshold, &observed);
            tracing::debug!(
                metric = %metric,
                observed = %observed,
                threshold = %threshold,
                status = %status,
                "Evaluated metric"
            );
            MetricVerdict {
                metric,
                observed,
                threshold,
                status,
            }
        })
        .collect();

    let passed = !metrics.iter().any(|m| m.status == MetricStatus::Fail);

    let mut verdict = EvaluationVerdict {
        passed,
        url: run.url.clone(),
        view,
        metrics,
        summary: result.data.summary.clone(),
        report: String::new(),
    };
    verdict.report = report::render_report(&verdict);
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_with(view: &str, record: Value) -> MetricsResult {
        serde_json::from_value(json!({
            "statusCode": 200,
            "data": {
                "id": "T1",
                "summary": "https://wpt.example/results.php?test=T1",
                "successfulFVRuns": 1,
                "median": { view: record }
            }
        }))
        .unwrap()
    }

    fn first_view_run() -> RunConfiguration {
        let mut run = RunConfiguration::new("https://example.com");
        run.first_view_only = true;
        run
    }

    #[test]
    fn test_classify() {
        let n = |v: u64| Observed::Number(v.into());
        assert_eq!(classify(Threshold::Max(1000.0), &n(800)), MetricStatus::Pass);
        assert_eq!(classify(Threshold::Max(1000.0), &n(1000)), MetricStatus::Pass);
        assert_eq!(classify(Threshold::Max(1000.0), &n(1001)), MetricStatus::Fail);
        assert_eq!(classify(Threshold::Unenforced, &n(99999)), MetricStatus::Skipped);
        assert_eq!(classify(Threshold::Max(10.0), &Observed::Absent), MetricStatus::Fail);
        assert_eq!(classify(Threshold::Unenforced, &Observed::Absent), MetricStatus::Skipped);
        assert_eq!(
            classify(Threshold::Max(10.0), &Observed::NonNumeric(json!([1, 2]))),
            MetricStatus::Skipped
        );
    }

    #[test]
    fn test_pass_within_budget() {
        let budget = BudgetConfiguration::new().with_max(Metric::LoadTime, 1000.0);
        let result = result_with("firstView", json!({"loadTime": 800}));

        let verdict = evaluate(&first_view_run(), &budget, &result);
        assert!(verdict.passed);
        assert_eq!(verdict.view, View::FirstView);
        assert_eq!(verdict.metric(Metric::LoadTime).unwrap().status, MetricStatus::Pass);
        assert_eq!(verdict.count(MetricStatus::Pass), 1);
        assert_eq!(verdict.count(MetricStatus::Skipped), Metric::ALL.len() - 1);
    }

    #[test]
    fn test_fail_over_budget() {
        let budget = BudgetConfiguration::new()
            .with_max(Metric::LoadTime, 1000.0)
            .with_max(Metric::Render, 500.0);
        let result = result_with("firstView", json!({"loadTime": 1200, "render": 400}));

        let verdict = evaluate(&first_view_run(), &budget, &result);
        assert!(!verdict.passed);
        let failures: Vec<Metric> = verdict.failures().map(|m| m.metric).collect();
        assert_eq!(failures, vec![Metric::LoadTime]);
    }

    #[test]
    fn test_missing_enforced_metric_fails() {
        let budget = BudgetConfiguration::new().with_max(Metric::VisualComplete, 3000.0);
        let result = result_with("firstView", json!({"loadTime": 800}));

        let verdict = evaluate(&first_view_run(), &budget, &result);
        assert!(!verdict.passed);
        let vc = verdict.metric(Metric::VisualComplete).unwrap();
        assert_eq!(vc.status, MetricStatus::Fail);
        assert_eq!(vc.observed, Observed::Absent);
    }

    #[test]
    fn test_null_observation_counts_as_absent() {
        let budget = BudgetConfiguration::new().with_max(Metric::Render, 500.0);
        let result = result_with("firstView", json!({"render": null}));
        let verdict = evaluate(&first_view_run(), &budget, &result);
        assert_eq!(verdict.metric(Metric::Render).unwrap().status, MetricStatus::Fail);
    }

    #[test]
    fn test_non_numeric_observation_skipped() {
        let budget = BudgetConfiguration::new().with_max(Metric::Requests, 50.0);
        let result = result_with("firstView", json!({"requests": [{"url": "a"}, {"url": "b"}]}));

        let verdict = evaluate(&first_view_run(), &budget, &result);
        assert!(verdict.passed);
        assert_eq!(verdict.metric(Metric::Requests).unwrap().status, MetricStatus::Skipped);
    }

    #[test]
    fn test_repeat_view_judged_by_default() {
        let budget = BudgetConfiguration::new().with_max(Metric::LoadTime, 1000.0);
        let result: MetricsResult = serde_json::from_value(json!({
            "statusCode": 200,
            "data": {
                "id": "T1",
                "successfulFVRuns": 1,
                "median": {
                    "firstView": {"loadTime": 1500},
                    "repeatView": {"loadTime": 600}
                }
            }
        }))
        .unwrap();

        let verdict = evaluate(&RunConfiguration::new("https://example.com"), &budget, &result);
        assert_eq!(verdict.view, View::RepeatView);
        assert!(verdict.passed);

        let verdict = evaluate(&first_view_run(), &budget, &result);
        assert_eq!(verdict.view, View::FirstView);
        assert!(!verdict.passed);
    }

    #[test]
    fn test_missing_view_judged_as_empty() {
        let budget = BudgetConfiguration::new().with_max(Metric::LoadTime, 1000.0);
        let result = result_with("firstView", json!({"loadTime": 800}));

        let verdict = evaluate(&RunConfiguration::new("https://example.com"), &budget, &result);
        assert!(!verdict.passed);
        assert_eq!(verdict.metric(Metric::LoadTime).unwrap().observed, Observed::Absent);
    }

    #[test]
    fn test_speed_index_payload_spelling() {
        let budget = BudgetConfiguration::new().with_max(Metric::SpeedIndex, 1000.0);
        let result = result_with("firstView", json!({"SpeedIndex": 1100}));
        let verdict = evaluate(&first_view_run(), &budget, &result);
        assert_eq!(verdict.metric(Metric::SpeedIndex).unwrap().status, MetricStatus::Fail);
    }

    #[test]
    fn test_unknown_payload_keys_ignored() {
        let budget = BudgetConfiguration::new();
        let result = result_with("firstView", json!({"TTFB": 5000, "loadTime": 99999}));
        let verdict = evaluate(&first_view_run(), &budget, &result);
        assert!(verdict.passed);
        assert_eq!(verdict.metrics.len(), Metric::ALL.len());
    }
}
