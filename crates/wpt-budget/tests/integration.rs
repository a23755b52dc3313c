//! End-to-end budget runs against a scripted test runner

use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use wpt_budget::config::RunConfiguration;
use wpt_budget::engine::classify;
use wpt_budget::task::{execute, execute_all};
use wpt_budget::{
    evaluate, normalize, run_budget_test, BudgetConfiguration, BudgetError, CompletedTest,
    Metric, MetricStatus, MetricsResult, Observed, TestOutcome, TestRunner, Threshold,
};

/// Returns a scripted outcome per URL and counts calls
struct ScriptedRunner {
    outcomes: HashMap<String, TestOutcome>,
    calls: AtomicUsize,
}

impl ScriptedRunner {
    fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn with(mut self, url: &str, outcome: TestOutcome) -> Self {
        self.outcomes.insert(url.to_string(), outcome);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TestRunner for ScriptedRunner {
    async fn run_test(&self, run: &RunConfiguration) -> TestOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .get(&run.url)
            .cloned()
            .unwrap_or_else(|| TestOutcome::TransportError {
                message: format!("no scripted outcome for {}", run.url),
            })
    }
}

const URL: &str = "https://example.com";

fn raw_result(test_id: &str, first_view: Value) -> Value {
    json!({
        "statusCode": 200,
        "statusText": "Test Complete",
        "data": {
            "id": test_id,
            "url": URL,
            "summary": format!("https://www.webpagetest.org/results.php?test={}", test_id),
            "successfulFVRuns": 1,
            "successfulRVRuns": 0,
            "median": { "firstView": first_view }
        }
    })
}

fn completed(raw: Value) -> TestOutcome {
    TestOutcome::Completed(Box::new(CompletedTest::from_raw(raw).unwrap()))
}

#[tokio::test]
async fn test_scenario_a_within_budget_passes() {
    let runner = ScriptedRunner::new().with(URL, completed(raw_result("T_A", json!({"loadTime": 800}))));
    let options = json!({
        "url": URL,
        "firstViewOnly": true,
        "budget": { "loadTime": 1000 }
    });

    let verdict = run_budget_test(&runner, Some(&options)).await.unwrap();

    assert!(verdict.passed);
    assert_eq!(verdict.metric(Metric::LoadTime).unwrap().status, MetricStatus::Pass);
    assert!(verdict.report.contains("loadTime: 800 [PASS]. Budget is 1000"));
    assert!(verdict.report.contains("PASSED"));
    assert_eq!(runner.calls(), 1);
}

#[tokio::test]
async fn test_scenario_b_over_budget_fails_with_report() {
    let runner =
        ScriptedRunner::new().with(URL, completed(raw_result("T_B", json!({"loadTime": 1200}))));
    let options = json!({
        "url": URL,
        "firstViewOnly": true,
        "budget": { "loadTime": 1000, "requests": 0 }
    });

    let (run, budget) = normalize(Some(&options)).unwrap();
    let verdict = execute(&runner, &run, &budget).await.unwrap();
    assert!(!verdict.passed);
    assert_eq!(verdict.metric(Metric::LoadTime).unwrap().status, MetricStatus::Fail);
    assert_eq!(verdict.metric(Metric::Requests).unwrap().status, MetricStatus::Skipped);

    match run_budget_test(&runner, Some(&options)).await.unwrap_err() {
        BudgetError::BudgetExceeded { url, report } => {
            assert_eq!(url, URL);
            assert!(report.contains("loadTime: 1200 [FAIL]. Budget is 1000"));
            assert!(report.contains("requests: n/a [SKIPPED]"));
            assert!(report.contains("FAILED"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_scenario_c_timeout_names_test_and_skips_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("result.json");
    let runner = ScriptedRunner::new().with(
        URL,
        TestOutcome::TimedOut {
            test_id: "200101_AB_1".to_string(),
            results_url: "https://www.webpagetest.org/results.php?test=200101_AB_1".to_string(),
        },
    );
    let options = json!({
        "url": URL,
        "output": artifact.display().to_string(),
        "budget": { "loadTime": 1000 }
    });

    let err = run_budget_test(&runner, Some(&options)).await.unwrap_err();

    assert!(matches!(err, BudgetError::RemoteTimeout { .. }));
    assert!(err.to_string().contains("200101_AB_1"));
    assert!(err.to_string().contains("results.php?test=200101_AB_1"));
    assert!(!artifact.exists());
}

#[tokio::test]
async fn test_missing_url_fails_before_running() {
    let runner = ScriptedRunner::new();
    let options = json!({ "budget": { "loadTime": 1000 } });

    let err = run_budget_test(&runner, Some(&options)).await.unwrap_err();
    assert!(matches!(err, BudgetError::Configuration(_)));

    let err = run_budget_test(&runner, None).await.unwrap_err();
    assert!(matches!(err, BudgetError::Configuration(_)));

    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn test_remote_error_surfaces_code() {
    let runner = ScriptedRunner::new().with(
        URL,
        TestOutcome::RemoteError {
            test_id: "T_ERR".to_string(),
            code: 402,
        },
    );
    let err = run_budget_test(&runner, Some(&json!({"url": URL})))
        .await
        .unwrap_err();

    match err {
        BudgetError::RemoteExecution { test_id, code } => {
            assert_eq!(test_id, "T_ERR");
            assert_eq!(code, 402);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_zero_successful_runs_is_incomplete() {
    let mut raw = raw_result("T_INC", json!({"loadTime": 800}));
    raw["data"]["successfulFVRuns"] = json!(0);
    let runner = ScriptedRunner::new().with(URL, completed(raw));

    let err = run_budget_test(&runner, Some(&json!({"url": URL})))
        .await
        .unwrap_err();
    assert!(matches!(err, BudgetError::IncompleteRun { .. }));
    assert!(err.to_string().contains("T_INC"));
}

#[tokio::test]
async fn test_artifact_written_before_budget_failure() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("reports/nested/result.json");
    let raw = raw_result("T_ART", json!({"loadTime": 1500}));
    let runner = ScriptedRunner::new().with(URL, completed(raw.clone()));
    let options = json!({
        "url": URL,
        "firstViewOnly": true,
        "output": artifact.display().to_string(),
        "prettyOutput": true,
        "budget": { "loadTime": 1000 }
    });

    let err = run_budget_test(&runner, Some(&options)).await.unwrap_err();
    assert!(matches!(err, BudgetError::BudgetExceeded { .. }));

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&artifact).unwrap()).unwrap();
    assert_eq!(written, raw);
}

#[tokio::test]
async fn test_several_urls_evaluate_independently() {
    let other = "https://other.example.com";
    let runner = ScriptedRunner::new()
        .with(URL, completed(raw_result("T_1", json!({"loadTime": 800}))))
        .with(
            other,
            TestOutcome::TransportError {
                message: "Connection failed".to_string(),
            },
        );

    let budget = BudgetConfiguration::new().with_max(Metric::LoadTime, 1000.0);
    let mut first = RunConfiguration::new(URL);
    first.first_view_only = true;
    let second = RunConfiguration::new(other);

    let results = execute_all(&runner, &[(first, budget.clone()), (second, budget)]).await;

    assert_eq!(results.len(), 2);
    assert!(results[0].as_ref().unwrap().passed);
    assert!(matches!(results[1], Err(BudgetError::Transport(_))));
    assert_eq!(runner.calls(), 2);
}

#[test]
fn test_blocking_run_for_build_steps() {
    let runner = ScriptedRunner::new().with(URL, completed(raw_result("T_BLK", json!({"render": 300}))));
    let options = json!({
        "url": URL,
        "firstViewOnly": true,
        "budget": { "render": 500 }
    });

    let verdict = tokio_test::block_on(run_budget_test(&runner, Some(&options))).unwrap();
    assert!(verdict.passed);
}

#[test]
fn test_rendering_is_deterministic() {
    let (run, budget) = normalize(Some(&json!({
        "url": URL,
        "firstViewOnly": true,
        "budget": { "loadTime": 1000, "render": 500, "speedIndex": 1200 }
    })))
    .unwrap();
    let result: MetricsResult = serde_json::from_value(raw_result(
        "T_DET",
        json!({"loadTime": 900, "render": 600, "SpeedIndex": 1100}),
    ))
    .unwrap();

    let first = evaluate(&run, &budget, &result);
    let second = evaluate(&run, &budget, &result);
    assert_eq!(first, second);
    assert_eq!(first.report, second.report);
}

fn record_from(values: &[u32]) -> Value {
    let mut record = Map::new();
    for (metric, value) in Metric::ALL.iter().zip(values) {
        record.insert(metric.payload_keys()[0].to_string(), json!(value));
    }
    Value::Object(record)
}

proptest! {
    #[test]
    fn test_enforced_metric_fails_iff_over_budget(limit in 1u32..100_000, observed in 0u32..200_000) {
        let status = classify(Threshold::Max(f64::from(limit)), &Observed::Number(observed.into()));
        prop_assert_eq!(status == MetricStatus::Fail, observed > limit);
        prop_assert_eq!(status == MetricStatus::Pass, observed <= limit);
    }

    #[test]
    fn test_unenforced_metrics_never_fail(values in proptest::collection::vec(0u32..1_000_000, 10)) {
        let mut run = RunConfiguration::new(URL);
        run.first_view_only = true;
        let result: MetricsResult =
            serde_json::from_value(raw_result("T_P", record_from(&values))).unwrap();

        let verdict = evaluate(&run, &BudgetConfiguration::new(), &result);
        prop_assert!(verdict.passed);
        prop_assert_eq!(verdict.count(MetricStatus::Skipped), Metric::ALL.len());
    }

    #[test]
    fn test_verdict_fails_iff_some_metric_fails(
        values in proptest::collection::vec(0u32..5_000, 10),
        limits in proptest::collection::vec(0u32..5_000, 10),
    ) {
        let mut run = RunConfiguration::new(URL);
        run.first_view_only = true;
        let budget = Metric::ALL
            .iter()
            .zip(&limits)
            .fold(BudgetConfiguration::new(), |b, (m, l)| b.with_max(*m, f64::from(*l)));
        let result: MetricsResult =
            serde_json::from_value(raw_result("T_P", record_from(&values))).unwrap();

        let verdict = evaluate(&run, &budget, &result);

        let expected_failures = values
            .iter()
            .zip(&limits)
            .filter(|(v, l)| **l != 0 && v > l)
            .count();
        prop_assert_eq!(verdict.count(MetricStatus::Fail), expected_failures);
        prop_assert_eq!(verdict.passed, expected_failures == 0);
    }
}
