//! CLI command definitions for the budget runner
//!
//! Options are loaded from a JSON, YAML or TOML file and command-line
//! overrides are merged on top before normalization.

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

use super::output::{ConfigOutput, OutputFormat, VerdictOutput};
use super::ExitCode;
use crate::client::WebPageTestClient;
use crate::config::{load_options, merge_overrides, normalize, BudgetConfiguration, RunConfiguration};
use crate::engine::metric::Metric;
use crate::error::{BudgetError, Result};
use crate::task;

/// WebPageTest budget runner
///
/// Run WebPageTest tests and fail when a performance budget is exceeded.
#[derive(Parser, Debug)]
#[command(name = "wpt-budget")]
#[command(about = "Run WebPageTest tests and enforce performance budgets", long_about = None)]
#[command(version)]
pub struct BudgetCli {
    /// Log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: BudgetCommands,
}

/// Available budget commands
#[derive(Subcommand, Debug)]
pub enum BudgetCommands {
    /// Run a test and evaluate it against the budget
    ///
    /// Several --url values run concurrently with the same options.
    Run {
        /// Options file (JSON, YAML or TOML)
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Page to test (repeatable)
        #[arg(short, long = "url", value_name = "URL")]
        urls: Vec<String>,

        #[command(flatten)]
        overrides: OverrideArgs,

        /// Output format for results
        #[arg(long, value_enum, default_value = "table")]
        format: Option<OutputFormat>,
    },

    /// Evaluate a saved raw result against the budget
    Evaluate {
        /// Options file (JSON, YAML or TOML)
        #[arg(short, long)]
        options: Option<PathBuf>,

        /// Raw result document written by a previous run
        #[arg(short, long)]
        result: PathBuf,

        #[command(flatten)]
        overrides: OverrideArgs,

        /// Output format for results
        #[arg(long, value_enum, default_value = "table")]
        format: Option<OutputFormat>,
    },

    /// Print the normalized configuration
    Config {
        /// Options file (JSON, YAML or TOML)
        #[arg(short, long)]
        options: Option<PathBuf>,

        #[command(flatten)]
        overrides: OverrideArgs,

        /// Output format for the configuration
        #[arg(long, value_enum, default_value = "table")]
        format: Option<OutputFormat>,
    },
}

/// Option overrides shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct OverrideArgs {
    /// WebPageTest API key
    #[arg(short, long, env = "WPT_API_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// WebPageTest instance host
    #[arg(long, env = "WPT_INSTANCE")]
    pub instance: Option<String>,

    /// Test location and browser, e.g. Dulles:Chrome
    #[arg(long)]
    pub location: Option<String>,

    /// Connectivity profile, e.g. Cable
    #[arg(long)]
    pub connectivity: Option<String>,

    /// Number of test runs
    #[arg(long)]
    pub runs: Option<u32>,

    /// Skip the repeat view and judge the first view
    #[arg(long)]
    pub first_view_only: bool,

    /// Poll interval in seconds
    #[arg(long, value_name = "SECONDS")]
    pub poll: Option<u64>,

    /// Maximum wait for the test in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Write the raw result document here
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Pretty-print the raw result document
    #[arg(long)]
    pub pretty: bool,

    /// Budget ceiling as metric=value (repeatable)
    #[arg(short, long = "budget", value_name = "METRIC=VALUE")]
    pub budget: Vec<String>,
}

impl OverrideArgs {
    /// Overrides as an options object fragment
    pub fn to_overrides(&self) -> Result<Map<String, Value>> {
        let mut map = Map::new();

        let strings = [
            ("key", &self.key),
            ("wptInstance", &self.instance),
            ("location", &self.location),
            ("connectivity", &self.connectivity),
        ];
        for (name, value) in strings {
            if let Some(value) = value {
                map.insert(name.to_string(), json!(value));
            }
        }

        if let Some(runs) = self.runs {
            map.insert("runs".to_string(), json!(runs));
        }
        if self.first_view_only {
            map.insert("firstViewOnly".to_string(), json!(true));
        }
        if let Some(poll) = self.poll {
            map.insert("pollResults".to_string(), json!(poll));
        }
        if let Some(timeout) = self.timeout {
            map.insert("timeout".to_string(), json!(timeout));
        }
        if let Some(output) = &self.output {
            map.insert("output".to_string(), json!(output.display().to_string()));
        }
        if self.pretty {
            map.insert("prettyOutput".to_string(), json!(true));
        }

        if !self.budget.is_empty() {
            let mut budget = Map::new();
            for entry in &self.budget {
                let (metric, value) = parse_budget_override(entry)?;
                budget.insert(metric, value);
            }
            map.insert("budget".to_string(), Value::Object(budget));
        }

        Ok(map)
    }
}

/// Parse a `metric=value` budget override
pub fn parse_budget_override(entry: &str) -> Result<(String, Value)> {
    let (metric, value) = entry.split_once('=').ok_or_else(|| {
        BudgetError::configuration(format!("budget override '{}' must be metric=value", entry))
    })?;

    let metric = Metric::from_config_key(metric.trim()).ok_or_else(|| {
        BudgetError::configuration(format!("unknown budget metric '{}'", metric.trim()))
    })?;

    let value = value.trim();
    let number = match value.parse::<u64>() {
        Ok(n) => Value::from(n),
        Err(_) => value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| {
                BudgetError::configuration(format!(
                    "budget value '{}' for {} is not a number",
                    value, metric
                ))
            })?,
    };

    Ok((metric.config_key().to_string(), number))
}

/// Load the options file (if any), merge overrides and normalize once per URL
pub fn build_configurations(
    options: Option<&Path>,
    urls: &[String],
    overrides: &OverrideArgs,
) -> Result<Vec<(RunConfiguration, BudgetConfiguration)>> {
    let base = options.map(load_options).transpose()?;
    let overrides = overrides.to_overrides()?;

    if urls.is_empty() {
        let merged = merge_overrides(base.as_ref(), &overrides);
        return Ok(vec![normalize(merged.as_ref())?]);
    }

    let mut configurations = urls
        .iter()
        .map(|url| {
            let mut per_url = overrides.clone();
            per_url.insert("url".to_string(), json!(url));
            normalize(merge_overrides(base.as_ref(), &per_url).as_ref())
        })
        .collect::<Result<Vec<_>>>()?;

    if configurations.len() > 1 {
        for (index, (run, _)) in configurations.iter_mut().enumerate() {
            if let Some(path) = run.output.take() {
                run.output = Some(indexed_path(&path, index + 1));
            }
        }
    }

    Ok(configurations)
}

/// `results/out.json` becomes `results/out-2.json` for index 2
pub fn indexed_path(path: &Path, index: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}-{}", stem, index),
    };
    path.with_file_name(name)
}

/// Execute the run command
pub async fn execute_run(
    options: Option<PathBuf>,
    urls: Vec<String>,
    overrides: OverrideArgs,
    format: Option<OutputFormat>,
) -> Result<ExitCode> {
    let configurations = build_configurations(options.as_deref(), &urls, &overrides)?;
    let client = WebPageTestClient::new()?;

    let results = task::execute_all(&client, &configurations).await;

    let mut exit_code = ExitCode::Success;
    let mut outputs = Vec::new();
    for ((run, _), result) in configurations.iter().zip(results) {
        match result {
            Ok(verdict) => {
                exit_code = exit_code.max(ExitCode::from_verdict(verdict.passed));
                outputs.push(VerdictOutput::from_verdict(&verdict));
            }
            Err(e) => {
                eprintln!("Error: {}: {}", run.url, e);
                exit_code = exit_code.max(ExitCode::from_error(&e));
            }
        }
    }

    if !outputs.is_empty() {
        VerdictOutput::render_all(&outputs, format.unwrap_or_default())?;
    }

    Ok(exit_code)
}

/// Execute the evaluate command
pub fn execute_evaluate(
    options: Option<PathBuf>,
    result: PathBuf,
    overrides: OverrideArgs,
    format: Option<OutputFormat>,
) -> Result<ExitCode> {
    let raw = load_options(&result)?;

    let base = options.as_deref().map(load_options).transpose()?;
    let mut overrides = overrides.to_overrides()?;
    let has_url = base
        .as_ref()
        .and_then(|b| b.get("url"))
        .and_then(Value::as_str)
        .is_some_and(|url| !url.trim().is_empty());
    if !has_url {
        if let Some(url) = raw.pointer("/data/url").and_then(Value::as_str) {
            overrides.insert("url".to_string(), json!(url));
        }
    }

    let (run, budget) = normalize(merge_overrides(base.as_ref(), &overrides).as_ref())?;
    let verdict = task::evaluate_saved_result(&run, &budget, raw)?;

    VerdictOutput::from_verdict(&verdict).render(format.unwrap_or_default())?;
    Ok(ExitCode::from_verdict(verdict.passed))
}

/// Execute the config command
pub fn execute_config(
    options: Option<PathBuf>,
    overrides: OverrideArgs,
    format: Option<OutputFormat>,
) -> Result<ExitCode> {
    let configurations = build_configurations(options.as_deref(), &[], &overrides)?;

    for (run, budget) in &configurations {
        ConfigOutput::new(run, budget).render(format.unwrap_or_default())?;
    }

    Ok(ExitCode::Success)
}
