//! WebPageTest Budget Runner
//!
//! A build-step runner that triggers a WebPageTest run for a URL, waits for
//! it to finish, and fails the step when any enforced metric exceeds its
//! budget.
//!
//! ## Features
//!
//! - **Budget Evaluation**: Per-metric PASS / FAIL / SKIPPED verdicts over a
//!   fixed metric vocabulary
//! - **Remote Execution**: Submit, poll and fetch against any WebPageTest
//!   instance, bounded by a timeout
//! - **Result Artifact**: Optionally persist the raw result document
//! - **Offline Evaluation**: Re-judge a saved result without the service
//! - **CLI Support**: Table, JSON and YAML output with meaningful exit codes
//!
//! ## Architecture
//!
//! 1. **Config** (`config/`): Options loading, override merging and
//!    normalization into canonical run and budget configurations.
//!
//! 2. **Contracts** (`contracts/`): WebPageTest payload shapes and the
//!    terminal outcomes of a remote test.
//!
//! 3. **Client** (`client/`): The [`TestRunner`] seam and its WebPageTest
//!    HTTP implementation.
//!
//! 4. **Engine** (`engine/`): Pure budget evaluation and report rendering.
//!
//! 5. **Task** (`task`): The end-to-end pipeline.
//!
//! 6. **CLI** (`cli/`): Command-line interface.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Run a test with budgets from an options file
//! wpt-budget run --options budget.yaml
//!
//! # Override the budget from the command line
//! wpt-budget run --url https://example.com --budget loadTime=1000 --budget render=500
//!
//! # Re-evaluate a saved result
//! wpt-budget evaluate --options budget.yaml --result out/result.json
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use wpt_budget::{run_budget_test, WebPageTestClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WebPageTestClient::new()?;
//!     let options = json!({
//!         "url": "https://example.com",
//!         "key": "API_KEY",
//!         "firstViewOnly": true,
//!         "budget": { "loadTime": 1000, "render": 500 }
//!     });
//!
//!     let verdict = run_budget_test(&client, Some(&options)).await?;
//!     println!("{}", verdict.report);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod task;

// Contracts module - located at ../contracts relative to src/
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use cli::{BudgetCli, BudgetCommands, ExitCode, OutputFormat};
pub use client::{TestRunner, WebPageTestClient, WebPageTestClientBuilder};
pub use config::{normalize, BudgetConfiguration, RunConfiguration};
pub use contracts::{CompletedTest, MetricsResult, TestOutcome, TestState, View};
pub use engine::metric::{Metric, Threshold};
pub use engine::{evaluate, EvaluationVerdict, MetricStatus, MetricVerdict, Observed};
pub use error::{BudgetError, Result};
pub use task::run_budget_test;

/// Crate version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the CLI application
///
/// This is the main entry point for the CLI binary.
///
/// # Example
///
/// ```rust,no_run
/// use clap::Parser;
/// use wpt_budget::{run_cli, BudgetCli};
///
/// #[tokio::main]
/// async fn main() {
///     let cli = BudgetCli::parse();
///     let exit_code = run_cli(cli).await;
///     std::process::exit(exit_code.into());
/// }
/// ```
pub async fn run_cli(cli: BudgetCli) -> ExitCode {
    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from_error(&e)
        }
    }
}
