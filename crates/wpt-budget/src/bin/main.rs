//! WebPageTest budget runner CLI
//!
//! # Usage
//!
//! ```bash
//! # Run a test and enforce the budget from an options file
//! wpt-budget run --options budget.json
//!
//! # Test several pages concurrently
//! wpt-budget run --options budget.json --url https://a.test --url https://b.test
//!
//! # Show the normalized configuration
//! wpt-budget config --options budget.json --format yaml
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success - every enforced metric passed
//! - 1: Budget exceeded
//! - 3: Invalid input or arguments
//! - 4: File not found, unreadable or not writable
//! - 5: Remote test timed out, errored or did not complete
//! - 6: WebPageTest instance unreachable
//! - 10: Internal error

use clap::Parser;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wpt_budget::{run_cli, BudgetCli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = BudgetCli::parse();
    init_tracing(cli.verbose, cli.log_json)?;

    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}

/// Logs go to stderr so reports on stdout stay machine-readable
fn init_tracing(verbose: u8, json: bool) -> anyhow::Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}
