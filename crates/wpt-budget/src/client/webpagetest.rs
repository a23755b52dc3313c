//! WebPageTest HTTP client
//!
//! Submits a test through `runtest.php`, polls `testStatus.php` until the
//! test leaves the queue, then fetches the full document from
//! `jsonResult.php`.
//!
//! # Design
//!
//! Failures never escape as errors: every path ends in a [`TestOutcome`].
//! The whole wait, including the final fetch, is bounded by the configured
//! timeout. Nothing is retried.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use super::TestRunner;
use crate::config::RunConfiguration;
use crate::contracts::{
    CompletedTest, StatusResponse, SubmitResponse, TestOutcome, TestState, STATUS_COMPLETE,
};
use crate::error::{BudgetError, Result};

/// Configuration for the WebPageTest client
#[derive(Debug, Clone)]
pub struct WebPageTestClientConfig {
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for WebPageTestClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            user_agent: format!("wpt-budget/{}", crate::VERSION),
        }
    }
}

/// HTTP client for a WebPageTest instance
pub struct WebPageTestClient {
    client: Client,
    config: WebPageTestClientConfig,
}

impl WebPageTestClient {
    /// Create a client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(WebPageTestClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: WebPageTestClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| BudgetError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Per-request timeout in milliseconds
    pub fn request_timeout_ms(&self) -> u64 {
        self.config.request_timeout_ms
    }

    /// Submit a test and return its id
    pub async fn submit(&self, run: &RunConfiguration) -> std::result::Result<String, String> {
        let url = format!("{}/runtest.php", run.instance_url());
        let response: SubmitResponse = self.get_json(&url, &runtest_params(run)).await?;

        if response.status_code != STATUS_COMPLETE {
            return Err(status_message(response.status_code, &response.status_text));
        }

        match response.data {
            Some(data) => {
                tracing::info!(
                    test_id = %data.test_id,
                    user_url = data.user_url.as_deref().unwrap_or(""),
                    state = %TestState::Submitted,
                    "Submitted test"
                );
                Ok(data.test_id)
            }
            None => Err("Submit response did not include a test id".to_string()),
        }
    }

    /// Current status of a test
    pub async fn status(
        &self,
        run: &RunConfiguration,
        test_id: &str,
    ) -> std::result::Result<StatusResponse, String> {
        let url = format!("{}/testStatus.php", run.instance_url());
        let params = [("f", "json".to_string()), ("test", test_id.to_string())];
        self.get_json(&url, &params).await
    }

    /// Fetch the full result document of a finished test
    pub async fn fetch_result(
        &self,
        run: &RunConfiguration,
        test_id: &str,
    ) -> std::result::Result<CompletedTest, String> {
        let url = format!("{}/jsonResult.php", run.instance_url());
        let params = [("test", test_id.to_string())];
        let raw: serde_json::Value = self.get_json(&url, &params).await?;
        CompletedTest::from_raw(raw).map_err(|e| e.to_string())
    }

    /// Poll until the test completes, then fetch the result
    async fn wait_for_result(
        &self,
        run: &RunConfiguration,
        test_id: &str,
    ) -> std::result::Result<CompletedTest, TestOutcome> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let status = self
                .status(run, test_id)
                .await
                .map_err(|message| TestOutcome::TransportError { message })?;

            tracing::debug!(
                test_id = %test_id,
                attempt = attempt,
                status_code = status.status_code,
                status_text = %status.status_text,
                state = %TestState::Polling,
                "Polled test status"
            );

            if status.is_complete() {
                break;
            }
            if !status.is_pending() {
                return Err(TestOutcome::RemoteError {
                    test_id: test_id.to_string(),
                    code: status.status_code,
                });
            }

            sleep(run.poll_interval()).await;
        }

        self.fetch_result(run, test_id)
            .await
            .map_err(|message| TestOutcome::TransportError { message })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, String> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| transport_message(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unexpected status")
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))
    }
}

#[async_trait]
impl TestRunner for WebPageTestClient {
    async fn run_test(&self, run: &RunConfiguration) -> TestOutcome {
        let test_id = match self.submit(run).await {
            Ok(id) => id,
            Err(message) => {
                tracing::warn!(url = %run.url, error = %message, "Failed to submit test");
                return TestOutcome::TransportError { message };
            }
        };

        let outcome = match timeout(run.timeout(), self.wait_for_result(run, &test_id)).await {
            Ok(Ok(completed)) => TestOutcome::Completed(Box::new(completed)),
            Ok(Err(outcome)) => outcome,
            Err(_) => TestOutcome::TimedOut {
                results_url: run.results_url(&test_id),
                test_id: test_id.clone(),
            },
        };

        tracing::info!(test_id = %test_id, state = %outcome.state(), "Test reached terminal state");
        outcome
    }
}

/// Query parameters for `runtest.php`
pub fn runtest_params(run: &RunConfiguration) -> Vec<(&'static str, String)> {
    let flag = |b: bool| if b { "1" } else { "0" }.to_string();

    let mut params = vec![
        ("url", run.url.clone()),
        ("f", "json".to_string()),
        ("location", run.location.clone()),
        ("connectivity", run.connectivity.clone()),
        ("runs", run.runs.to_string()),
        ("fvonly", flag(run.first_view_only)),
        ("video", flag(run.video)),
    ];

    if !run.key.is_empty() {
        params.push(("k", run.key.clone()));
    }
    if let Some(bw) = run.bandwidth_down {
        params.push(("bwDown", bw.to_string()));
    }
    if let Some(bw) = run.bandwidth_up {
        params.push(("bwUp", bw.to_string()));
    }
    if let Some(latency) = run.latency {
        params.push(("latency", latency.to_string()));
    }
    if let Some(plr) = run.packet_loss_rate {
        params.push(("plr", plr.to_string()));
    }
    if let Some(login) = &run.login {
        params.push(("login", login.clone()));
        params.push(("authType", run.authentication_type.code().to_string()));
    }
    if let Some(password) = &run.password {
        params.push(("password", password.clone()));
    }

    params
}

fn status_message(code: i64, text: &str) -> String {
    if text.is_empty() {
        format!("Unexpected status code {}", code)
    } else {
        text.to_string()
    }
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("Request timed out: {}", err)
    } else if err.is_connect() {
        format!("Connection failed: {}", err)
    } else {
        err.to_string()
    }
}

/// Builder for WebPageTestClient
pub struct WebPageTestClientBuilder {
    config: WebPageTestClientConfig,
}

impl WebPageTestClientBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: WebPageTestClientConfig::default(),
        }
    }

    /// Set the per-request timeout
    pub fn request_timeout_ms(mut self, timeout: u64) -> Self {
        self.config.request_timeout_ms = timeout;
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<WebPageTestClient> {
        WebPageTestClient::with_config(self.config)
    }
}

impl Default for WebPageTestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
