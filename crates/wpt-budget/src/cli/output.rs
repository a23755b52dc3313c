//! Output formatting for the budget runner CLI
//!
//! Renders verdicts and configurations as JSON, YAML or a colored table.
//! The verdict table is the plain-text budget report with each metric line
//! colored by status: green PASS, red FAIL, dimmed SKIPPED.

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

use crate::config::{BudgetConfiguration, RunConfiguration};
use crate::engine::metric::format_number;
use crate::engine::report::{render_banner, render_line, RULE};
use crate::engine::{EvaluationVerdict, MetricStatus, MetricVerdict, Observed};
use crate::error::{BudgetError, Result};

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table format with colors
    #[default]
    Table,
    /// JSON format for machine processing
    Json,
    /// YAML format
    Yaml,
}

/// Verdict output structure for rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictOutput {
    /// Page under test
    pub url: String,
    /// Overall result
    pub passed: bool,
    /// Judged median record
    pub view: String,
    /// Metrics within budget
    pub pass_count: usize,
    /// Metrics over budget
    pub fail_count: usize,
    /// Metrics not judged
    pub skipped_count: usize,
    /// Per-metric results in report order
    pub metrics: Vec<MetricOutput>,
    /// Remote summary link
    pub summary: String,
    /// Plain-text budget report
    pub report: String,
}

/// Individual metric output structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricOutput {
    /// Metric name
    pub metric: String,
    /// Observed median value, when numeric
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<serde_json::Number>,
    /// Budget ceiling, when enforced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    /// PASS, FAIL or SKIPPED
    pub status: MetricStatus,
    /// Report line for this metric
    #[serde(skip)]
    pub line: String,
}

impl MetricOutput {
    fn from_metric(verdict: &MetricVerdict) -> Self {
        let observed = match &verdict.observed {
            Observed::Number(n) => Some(n.clone()),
            Observed::Absent | Observed::NonNumeric(_) => None,
        };

        Self {
            metric: verdict.metric.to_string(),
            observed,
            budget: verdict.threshold.limit(),
            status: verdict.status,
            line: render_line(verdict),
        }
    }
}

impl VerdictOutput {
    /// Create output from a verdict
    pub fn from_verdict(verdict: &EvaluationVerdict) -> Self {
        Self {
            url: verdict.url.clone(),
            passed: verdict.passed,
            view: verdict.view.to_string(),
            pass_count: verdict.count(MetricStatus::Pass),
            fail_count: verdict.count(MetricStatus::Fail),
            skipped_count: verdict.count(MetricStatus::Skipped),
            metrics: verdict.metrics.iter().map(MetricOutput::from_metric).collect(),
            summary: verdict.summary.clone(),
            report: verdict.report.clone(),
        }
    }

    /// Render output in the specified format
    pub fn render(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => render_json(self),
            OutputFormat::Yaml => render_yaml(self),
            OutputFormat::Table => {
                self.render_table();
                Ok(())
            }
        }
    }

    /// Render several verdicts; JSON and YAML emit a single list document
    pub fn render_all(outputs: &[VerdictOutput], format: OutputFormat) -> Result<()> {
        match (format, outputs) {
            (_, [single]) => single.render(format),
            (OutputFormat::Json, _) => render_json(&outputs),
            (OutputFormat::Yaml, _) => render_yaml(&outputs),
            (OutputFormat::Table, _) => {
                for output in outputs {
                    output.render_table();
                }
                Ok(())
            }
        }
    }

    fn render_table(&self) {
        let mut stdout = io::stdout();

        for metric in &self.metrics {
            writeln!(stdout, "{}", paint(&metric.line, metric.status)).ok();
        }

        writeln!(stdout).ok();
        writeln!(stdout, "{}", RULE).ok();
        let banner = render_banner(&self.url, self.passed);
        if self.passed {
            writeln!(stdout, "{}", banner.green().bold()).ok();
        } else {
            writeln!(stdout, "{}", banner.red().bold()).ok();
        }
        writeln!(stdout, "{}", RULE).ok();
        writeln!(stdout, "Summary: {}", self.summary).ok();
        writeln!(
            stdout,
            "{}",
            format!(
                "{} passed, {} failed, {} skipped ({})",
                self.pass_count, self.fail_count, self.skipped_count, self.view
            )
            .dimmed()
        )
        .ok();
        writeln!(stdout).ok();
    }
}

/// Normalized configuration output structure
#[derive(Debug, Clone, Serialize)]
pub struct ConfigOutput {
    /// Run parameters, secrets redacted
    pub run: RunConfiguration,
    /// Budget ceilings in report order
    pub budget: Vec<ThresholdOutput>,
    /// Budget keys that will not be evaluated
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_budget_keys: Vec<String>,
}

/// One budget ceiling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdOutput {
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ConfigOutput {
    /// Create output from normalized configurations
    pub fn new(run: &RunConfiguration, budget: &BudgetConfiguration) -> Self {
        Self {
            run: run.clone(),
            budget: budget
                .iter()
                .map(|(metric, threshold)| ThresholdOutput {
                    metric: metric.to_string(),
                    max: threshold.limit(),
                })
                .collect(),
            ignored_budget_keys: budget.unknown().keys().cloned().collect(),
        }
    }

    /// Render output in the specified format
    pub fn render(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => render_json(self),
            OutputFormat::Yaml => render_yaml(self),
            OutputFormat::Table => {
                self.render_table();
                Ok(())
            }
        }
    }

    fn render_table(&self) {
        let mut stdout = io::stdout();
        let run = &self.run;

        writeln!(stdout).ok();
        writeln!(stdout, "{}", "Run Configuration".cyan().bold()).ok();
        writeln!(stdout, "{}", "=".repeat(60)).ok();

        let set_or_unset = |present: bool| if present { "set" } else { "unset" };
        let rows: Vec<(&str, String)> = vec![
            ("url", run.url.clone()),
            ("instance", run.instance_url()),
            ("key", set_or_unset(!run.key.is_empty()).to_string()),
            ("location", run.location.clone()),
            ("connectivity", run.connectivity.clone()),
            ("runs", run.runs.to_string()),
            ("firstViewOnly", run.first_view_only.to_string()),
            ("video", run.video.to_string()),
            ("pollResults", format!("{}s", run.poll_interval().as_secs())),
            ("timeout", format!("{}s", run.timeout().as_secs())),
            (
                "output",
                run.output
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "unset".to_string()),
            ),
            ("login", set_or_unset(run.login.is_some()).to_string()),
        ];
        for (name, value) in rows {
            writeln!(stdout, "  {:<16} {}", name.blue(), value).ok();
        }

        let custom: Vec<String> = [
            run.bandwidth_down.map(|v| format!("bwDown={}", v)),
            run.bandwidth_up.map(|v| format!("bwUp={}", v)),
            run.latency.map(|v| format!("latency={}", v)),
            run.packet_loss_rate.map(|v| format!("plr={}", v)),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !custom.is_empty() {
            writeln!(stdout, "  {:<16} {}", "custom".blue(), custom.join(" ")).ok();
        }

        writeln!(stdout).ok();
        writeln!(stdout, "{}", "Budget".cyan().bold()).ok();
        writeln!(stdout, "{}", "=".repeat(60)).ok();
        for threshold in &self.budget {
            let value = match threshold.max {
                Some(max) => format_number(max).normal(),
                None => "unenforced".dimmed(),
            };
            writeln!(stdout, "  {:<16} {}", threshold.metric, value).ok();
        }

        if !self.ignored_budget_keys.is_empty() {
            writeln!(stdout).ok();
            writeln!(
                stdout,
                "  {} ignored budget keys: {}",
                "!".yellow(),
                self.ignored_budget_keys.join(", ")
            )
            .ok();
        }
        writeln!(stdout).ok();
    }
}

fn paint(line: &str, status: MetricStatus) -> ColoredString {
    match status {
        MetricStatus::Pass => line.green(),
        MetricStatus::Fail => line.red().bold(),
        MetricStatus::Skipped => line.dimmed(),
    }
}

fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| BudgetError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn render_yaml<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let yaml =
        serde_yaml::to_string(value).map_err(|e| BudgetError::Serialization(e.to_string()))?;
    println!("{}", yaml);
    Ok(())
}
