//! Budget test pipeline
//!
//! Wires normalization, remote execution, the output artifact and the
//! evaluator together:
//!
//! 1. Normalize the raw options (fails before any network activity).
//! 2. Run the remote test to a terminal outcome.
//! 3. Accept only a completed test with a successful first-view run.
//! 4. Write the raw result to `output`, when configured.
//! 5. Evaluate the judged median record against the budget.
//! 6. Turn a failing verdict into [`BudgetError::BudgetExceeded`].

use futures::future::join_all;
use serde_json::Value;
use std::path::Path;

use crate::client::TestRunner;
use crate::config::{normalize, BudgetConfiguration, RunConfiguration};
use crate::contracts::{CompletedTest, TestOutcome};
use crate::engine::{evaluate, EvaluationVerdict};
use crate::error::{BudgetError, Result};

/// Run a budget test end to end.
///
/// Resolves to the verdict when every enforced metric passes and to
/// [`BudgetError::BudgetExceeded`] carrying the report otherwise.
pub async fn run_budget_test<R>(runner: &R, options: Option<&Value>) -> Result<EvaluationVerdict>
where
    R: TestRunner + ?Sized,
{
    let (run, budget) = normalize(options)?;
    let verdict = execute(runner, &run, &budget).await?;
    enforce(verdict)
}

/// Run one normalized configuration and evaluate it.
///
/// A failing verdict is still `Ok`; use [`enforce`] to turn it into an
/// error.
pub async fn execute<R>(
    runner: &R,
    run: &RunConfiguration,
    budget: &BudgetConfiguration,
) -> Result<EvaluationVerdict>
where
    R: TestRunner + ?Sized,
{
    tracing::info!(url = %run.url, instance = %run.wpt_instance, "Running budget test");

    let outcome = runner.run_test(run).await;
    let completed = outcome.into_completed().map_err(|e| {
        tracing::warn!(url = %run.url, error = %e, "Remote test did not complete");
        e
    })?;

    if let Some(path) = &run.output {
        write_artifact(path, &completed.raw, run.pretty_output)?;
    }

    Ok(judge(run, budget, &completed))
}

/// Run several configurations concurrently.
///
/// Results come back in input order; one failure does not affect the
/// others.
pub async fn execute_all<R>(
    runner: &R,
    configurations: &[(RunConfiguration, BudgetConfiguration)],
) -> Vec<Result<EvaluationVerdict>>
where
    R: TestRunner + ?Sized,
{
    join_all(
        configurations
            .iter()
            .map(|(run, budget)| execute(runner, run, budget)),
    )
    .await
}

/// Evaluate a previously saved raw result without contacting the service
pub fn evaluate_saved_result(
    run: &RunConfiguration,
    budget: &BudgetConfiguration,
    raw: Value,
) -> Result<EvaluationVerdict> {
    let completed = TestOutcome::Completed(Box::new(CompletedTest::from_raw(raw)?)).into_completed()?;
    Ok(judge(run, budget, &completed))
}

/// Fail with the full report when any enforced metric failed
pub fn enforce(verdict: EvaluationVerdict) -> Result<EvaluationVerdict> {
    if verdict.passed {
        Ok(verdict)
    } else {
        Err(BudgetError::BudgetExceeded {
            url: verdict.url,
            report: verdict.report,
        })
    }
}

/// Write the raw result document, creating parent directories
pub fn write_artifact(path: &Path, raw: &Value, pretty: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            BudgetError::Artifact(format!(
                "Failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let content = if pretty {
        serde_json::to_string_pretty(raw)
    } else {
        serde_json::to_string(raw)
    }
    .map_err(|e| BudgetError::Serialization(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| {
        BudgetError::Artifact(format!("Failed to write '{}': {}", path.display(), e))
    })?;

    tracing::info!(path = %path.display(), "Wrote result artifact");
    Ok(())
}

fn judge(
    run: &RunConfiguration,
    budget: &BudgetConfiguration,
    completed: &CompletedTest,
) -> EvaluationVerdict {
    let verdict = evaluate(run, budget, &completed.result);
    tracing::info!(
        url = %verdict.url,
        test_id = %completed.test_id(),
        completed_at = %completed.completed_at.to_rfc3339(),
        passed = verdict.passed,
        "Evaluated budget"
    );
    verdict
}
