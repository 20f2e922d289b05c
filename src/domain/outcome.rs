//! Orchestrator outcome returned to the external caller.
//!
//! Failure is always expressed as data. A caller receives this structure for
//! every event, with `status` distinguishing a full pipeline run from a
//! degraded one; there is no error path that escapes as a transport fault.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::decision::{ActionId, Decision};
use super::execution::ExecutionResult;

/// Overall pipeline outcome for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Both stages responded (their results may still be noop/rejected).
    Processed,

    /// A downstream dependency failed; a safe fallback was substituted.
    Degraded,
}

/// Per-event stages, in order. Terminal states are always reached because
/// both downstream calls are bounded by timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStage {
    Received,
    DecisionPending,
    DecisionOk,
    DecisionDegraded,
    ExecutionPending,
    ExecutionOk,
    ExecutionDegraded,
    Complete,
}

impl fmt::Display for EventStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventStage::Received => "received",
            EventStage::DecisionPending => "decision_pending",
            EventStage::DecisionOk => "decision_ok",
            EventStage::DecisionDegraded => "decision_degraded",
            EventStage::ExecutionPending => "execution_pending",
            EventStage::ExecutionOk => "execution_ok",
            EventStage::ExecutionDegraded => "execution_degraded",
            EventStage::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// The unified response for one processed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventOutcome {
    pub status: PipelineStatus,
    pub event_id: String,
    pub agent_decision: Decision,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_result: Option<ExecutionResult>,

    /// Failure cause (`decision_timeout`, `execution_connection_error`, ...)
    /// when degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The safe action substituted when degraded (always noop).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ActionId>,
}

impl EventOutcome {
    pub fn processed(
        event_id: String,
        decision: Decision,
        result: ExecutionResult,
    ) -> Self {
        Self {
            status: PipelineStatus::Processed,
            event_id,
            agent_decision: decision,
            orchestrator_result: Some(result),
            error: None,
            fallback: None,
        }
    }

    pub fn degraded(
        event_id: String,
        decision: Decision,
        result: Option<ExecutionResult>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: PipelineStatus::Degraded,
            event_id,
            agent_decision: decision,
            orchestrator_result: result,
            error: Some(error.into()),
            fallback: Some(ActionId::Noop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_outcome_carries_fallback() {
        let outcome = EventOutcome::degraded(
            "evt_12345678".to_string(),
            Decision::noop("dependency_unavailable"),
            None,
            "decision_timeout",
        );

        assert_eq!(outcome.status, PipelineStatus::Degraded);
        assert_eq!(outcome.fallback, Some(ActionId::Noop));

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["error"], "decision_timeout");
        assert_eq!(json["fallback"], "noop");
        assert_eq!(json["agent_decision"]["decision"], "noop");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(EventStage::DecisionPending.to_string(), "decision_pending");
        assert_eq!(EventStage::Complete.to_string(), "complete");
    }
}
