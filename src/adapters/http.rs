//! HTTP clients for remote decision/execution services.
//!
//! Deployments that split the decision maker and the executor into their
//! own services expose `POST /decide` and `POST /execute`; these clients
//! speak that contract. The orchestrator still applies its own deadline on
//! top, so the clients carry no timeout of their own.

use async_trait::async_trait;

use crate::domain::{Decision, EventPayload, ExecutionRequest, ExecutionResult};

use super::{DecisionService, ExecutionService, FailureKind};

fn classify(err: reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::ConnectionError
    } else if err.is_decode() || err.is_status() {
        FailureKind::ProtocolError
    } else {
        FailureKind::Unexpected(err.to_string())
    }
}

/// Client for a remote decision service.
pub struct HttpDecisionService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDecisionService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DecisionService for HttpDecisionService {
    fn name(&self) -> &str {
        "http_decision"
    }

    async fn decide(&self, payload: &EventPayload) -> Result<Decision, FailureKind> {
        let response = self
            .client
            .post(format!("{}/decide", self.base_url))
            .json(payload)
            .send()
            .await
            .map_err(classify)?;

        let response = response.error_for_status().map_err(classify)?;
        response.json::<Decision>().await.map_err(classify)
    }
}

/// Client for a remote execution service.
pub struct HttpExecutionService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExecutionService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ExecutionService for HttpExecutionService {
    fn name(&self) -> &str {
        "http_execution"
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, FailureKind> {
        let response = self
            .client
            .post(format!("{}/execute", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(classify)?;

        let response = response.error_for_status().map_err(classify)?;
        response.json::<ExecutionResult>().await.map_err(classify)
    }
}
