//! Service seams between the orchestrator and its two downstreams.
//!
//! The orchestrator talks to the decision maker and the executor through
//! these traits so the same pipeline runs against in-process components or
//! remote HTTP services interchangeably.

pub mod http;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::domain::{
    ActionId, Decision, Environment, EventPayload, ExecutionRequest, ExecutionResult,
};

pub use http::{HttpDecisionService, HttpExecutionService};

/// Why a downstream call failed.
///
/// Timeouts are raised by the orchestrator's own deadline as well as by
/// clients; both fold into the same subtype.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error("timeout")]
    Timeout,

    #[error("connection_error")]
    ConnectionError,

    #[error("protocol_error")]
    ProtocolError,

    #[error("unexpected_error: {0}")]
    Unexpected(String),
}

impl FailureKind {
    /// Short tag used in degraded-outcome error strings.
    pub fn tag(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ConnectionError => "connection_error",
            FailureKind::ProtocolError => "protocol_error",
            FailureKind::Unexpected(_) => "unexpected_error",
        }
    }
}

/// A decision maker the orchestrator can call.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Human-readable service name.
    fn name(&self) -> &str;

    async fn decide(&self, payload: &EventPayload) -> Result<Decision, FailureKind>;
}

/// An action executor the orchestrator can call.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, FailureKind>;
}

/// The seam to real infrastructure behind the gateway.
#[async_trait]
pub trait InfraAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Apply one allowed action to one application.
    async fn apply(&self, action: ActionId, app: &str, env: Environment) -> anyhow::Result<()>;
}

/// Infrastructure adapter that records the action and succeeds.
///
/// Stands in for the cluster/CD integration in deployments that have not
/// wired one yet; the allowlist and simulate gates still apply in full.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyInfra;

#[async_trait]
impl InfraAdapter for LogOnlyInfra {
    fn name(&self) -> &str {
        "log_only"
    }

    async fn apply(&self, action: ActionId, app: &str, env: Environment) -> anyhow::Result<()> {
        info!(%action, app, %env, "real_action_executing");
        Ok(())
    }
}
