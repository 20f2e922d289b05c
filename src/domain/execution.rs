//! Execution requests and results exchanged with the gateway.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::{ActionId, Decision};

/// A request to carry out one action against one application.
///
/// Fields are optional strings on purpose: the gateway is a trust boundary
/// and validates every request itself, whether it was built internally from
/// a decision or arrived over the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,

    #[serde(default)]
    pub decision_metadata: BTreeMap<String, serde_json::Value>,
}

impl ExecutionRequest {
    /// Derive a request from a decision (one-to-one).
    pub fn from_decision(decision: &Decision, app: &str, env: &str, requested_by: &str) -> Self {
        let mut decision_metadata = BTreeMap::new();
        decision_metadata.insert(
            "confidence".to_string(),
            serde_json::json!(decision.confidence),
        );
        decision_metadata.insert("reason".to_string(), serde_json::json!(decision.reason));

        Self {
            action: Some(decision.action.as_str().to_string()),
            app: Some(app.to_string()),
            env: Some(env.to_string()),
            requested_by: Some(requested_by.to_string()),
            decision_metadata,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.action.is_none()
            && self.app.is_none()
            && self.env.is_none()
            && self.requested_by.is_none()
            && self.decision_metadata.is_empty()
    }
}

/// Outcome category of an execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Action was applied to real infrastructure.
    Executed,

    /// Action was allowed but only recorded (simulate mode).
    Simulated,

    /// Request failed validation or allowlist enforcement.
    Rejected,

    /// Action was allowed but the infrastructure call failed.
    Failed,
}

/// Result of one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub action: String,
    pub app: String,
    pub env: String,
    pub execution_id: String,
    pub demo_mode: bool,
    pub timestamp: DateTime<Utc>,

    /// Rejection or failure reason, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// The allowed set for the environment, reported on allowlist rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_actions: Option<Vec<ActionId>>,
}

impl ExecutionResult {
    pub fn new(status: ExecutionStatus, request: &ExecutionRequest, demo_mode: bool) -> Self {
        Self {
            status,
            action: request.action.clone().unwrap_or_else(|| "unknown".to_string()),
            app: request.app.clone().unwrap_or_else(|| "unknown".to_string()),
            env: request.env.clone().unwrap_or_else(|| "unknown".to_string()),
            execution_id: Self::generate_id("exec"),
            demo_mode,
            timestamp: Utc::now(),
            reason: None,
            allowed_actions: None,
        }
    }

    /// Rejection result carrying a reason tag; uses an `err_` id prefix.
    pub fn rejected(request: &ExecutionRequest, reason: impl Into<String>, demo_mode: bool) -> Self {
        let mut result = Self::new(ExecutionStatus::Rejected, request, demo_mode);
        result.execution_id = Self::generate_id("err");
        result.reason = Some(reason.into());
        result
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_allowed_actions(mut self, allowed: Vec<ActionId>) -> Self {
        self.allowed_actions = Some(allowed);
        self
    }

    /// Short unique id, e.g. `exec_3fa85f64`.
    fn generate_id(prefix: &str) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("{}_{}", prefix, &hex[..8])
    }

    /// True when the action took effect (really or simulated).
    pub fn succeeded(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::Executed | ExecutionStatus::Simulated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_decision() {
        let decision = Decision::new(ActionId::Restart, "state_critical", 0.9);
        let request = ExecutionRequest::from_decision(&decision, "billing", "prod", "agent");

        assert_eq!(request.action.as_deref(), Some("restart"));
        assert_eq!(request.app.as_deref(), Some("billing"));
        assert_eq!(request.env.as_deref(), Some("prod"));
        assert_eq!(request.requested_by.as_deref(), Some("agent"));
        assert_eq!(
            request.decision_metadata.get("reason"),
            Some(&serde_json::json!("state_critical"))
        );
    }

    #[test]
    fn test_empty_request_parses_from_empty_json() {
        let request: ExecutionRequest = serde_json::from_str("{}").unwrap();
        assert!(request.is_empty());
    }

    #[test]
    fn test_execution_id_prefixes() {
        let request = ExecutionRequest::default();
        let ok = ExecutionResult::new(ExecutionStatus::Simulated, &request, true);
        assert!(ok.execution_id.starts_with("exec_"));

        let rejected = ExecutionResult::rejected(&request, "empty_payload", true);
        assert!(rejected.execution_id.starts_with("err_"));
        assert_eq!(rejected.reason.as_deref(), Some("empty_payload"));
    }

    #[test]
    fn test_succeeded() {
        let request = ExecutionRequest::default();
        assert!(ExecutionResult::new(ExecutionStatus::Executed, &request, false).succeeded());
        assert!(ExecutionResult::new(ExecutionStatus::Simulated, &request, true).succeeded());
        assert!(!ExecutionResult::rejected(&request, "nope", true).succeeded());
    }
}
