//! Remote test execution
//!
//! The budget engine never talks to the network itself. A [`TestRunner`]
//! submits a test, waits for it, and resolves to exactly one terminal
//! [`TestOutcome`].

pub mod webpagetest;

use async_trait::async_trait;

use crate::config::RunConfiguration;
use crate::contracts::TestOutcome;

pub use webpagetest::{WebPageTestClient, WebPageTestClientBuilder};

/// Something that can execute a remote performance test
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run one test to a terminal outcome, bounded by `run.timeout()`
    async fn run_test(&self, run: &RunConfiguration) -> TestOutcome;
}
