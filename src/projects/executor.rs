use std::time::Instant;

use async_trait::async_trait;
use reqwest::Method;

use super::model::{AssertionOutcome, Endpoint, TestStatus};

/// What one execution produced, before it is persisted as a `TestResult`.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub status: TestStatus,
    pub response_time_ms: f64,
    /// 0 when no response was received.
    pub status_code: u16,
    pub assertions: Vec<AssertionOutcome>,
    pub error: Option<String>,
}

impl TestOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Error,
            response_time_ms: 0.0,
            status_code: 0,
            assertions: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Executes one endpoint test. Runs are strictly sequential; the engine
/// enforces no per-test timeout beyond the client's own.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    async fn execute(&self, base_url: Option<&str>, endpoint: &Endpoint) -> TestOutcome;
}

/// Live executor: issues the endpoint's method against `base_url` + path and
/// asserts on status class and response time.
pub struct HttpTestExecutor {
    client: reqwest::Client,
    response_time_threshold_ms: u64,
}

impl HttpTestExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            response_time_threshold_ms: crate::config::config().testing.response_time_threshold_ms,
        }
    }
}

impl Default for HttpTestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestExecutor for HttpTestExecutor {
    async fn execute(&self, base_url: Option<&str>, endpoint: &Endpoint) -> TestOutcome {
        let Some(base_url) = base_url else {
            return TestOutcome::error("no target base URL provided for this run");
        };

        let method = match endpoint.method.parse::<Method>() {
            Ok(m) => m,
            Err(_) => return TestOutcome::error(format!("unsupported method {}", endpoint.method)),
        };

        let url = format!("{}{}", base_url.trim_end_matches('/'), endpoint.path);
        let started = Instant::now();
        let response = self.client.request(method, &url).send().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match response {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let status_ok = response.status().is_success();
                let fast_enough = elapsed_ms <= self.response_time_threshold_ms as f64;

                let assertions = vec![
                    AssertionOutcome {
                        name: "status_2xx".to_string(),
                        passed: status_ok,
                        detail: Some(format!("received {}", status_code)),
                    },
                    AssertionOutcome {
                        name: "response_time".to_string(),
                        passed: fast_enough,
                        detail: Some(format!(
                            "{:.0}ms (threshold {}ms)",
                            elapsed_ms, self.response_time_threshold_ms
                        )),
                    },
                ];

                let status = if status_ok && fast_enough {
                    TestStatus::Passed
                } else {
                    TestStatus::Failed
                };

                TestOutcome {
                    status,
                    response_time_ms: elapsed_ms,
                    status_code,
                    assertions,
                    error: None,
                }
            }
            Err(e) => TestOutcome {
                status: TestStatus::Error,
                response_time_ms: elapsed_ms,
                status_code: 0,
                assertions: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}
