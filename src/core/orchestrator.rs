//! Event orchestrator: drives one event through decision and execution.
//!
//! Both downstream calls run under their own deadline, so every event
//! reaches a terminal stage in bounded time. Any downstream failure folds
//! into a degraded outcome carrying a noop fallback; the caller always gets
//! a well-formed response, never an error.
//!
//! Cancellation is cooperative: dropping the `process_event` future cancels
//! whichever downstream call is in flight, and no value-table update runs
//! afterwards because learning happens strictly after execution completes.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{DecisionService, ExecutionService, FailureKind};
use crate::domain::{
    Decision, EventOutcome, EventPayload, EventStage, ExecutionRequest, ExecutionResult,
    ExecutionStatus,
};
use crate::policy::{Learner, StateId};

/// Default deadline for each downstream call.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(3);

/// Orchestrates decision then execution for each inbound event.
///
/// Events are independent: the orchestrator holds no per-event state, so
/// any number of `process_event` calls may run concurrently. Admission
/// control, if needed, belongs to the caller.
pub struct EventOrchestrator {
    decision: Arc<dyn DecisionService>,
    execution: Arc<dyn ExecutionService>,
    decision_timeout: Duration,
    execution_timeout: Duration,
    learner: Option<Arc<Learner>>,
}

impl EventOrchestrator {
    pub fn new(decision: Arc<dyn DecisionService>, execution: Arc<dyn ExecutionService>) -> Self {
        Self {
            decision,
            execution,
            decision_timeout: DEFAULT_STAGE_TIMEOUT,
            execution_timeout: DEFAULT_STAGE_TIMEOUT,
            learner: None,
        }
    }

    pub fn with_timeouts(mut self, decision: Duration, execution: Duration) -> Self {
        self.decision_timeout = decision;
        self.execution_timeout = execution;
        self
    }

    /// Attach a learner; successful pipelines then feed execution outcomes
    /// back into the value table.
    pub fn with_learner(mut self, learner: Arc<Learner>) -> Self {
        self.learner = Some(learner);
        self
    }

    /// Process one event end to end. Infallible by contract.
    #[instrument(skip_all, fields(event_id))]
    pub async fn process_event(&self, event: &EventPayload) -> EventOutcome {
        let event_id = generate_event_id();
        tracing::Span::current().record("event_id", event_id.as_str());

        info!(
            stage = %EventStage::Received,
            event_type = event.event_type.as_deref().unwrap_or("unknown"),
            app = event.app.as_deref().unwrap_or("unknown"),
            env = event.env.as_deref().unwrap_or("unknown"),
            "event_received"
        );

        // Stage 1: decision, bounded.
        info!(stage = %EventStage::DecisionPending, service = self.decision.name(), "calling_decision");
        let decision = match self.bounded_decide(event).await {
            Ok(decision) => {
                info!(
                    stage = %EventStage::DecisionOk,
                    decision = %decision.action,
                    reason = %decision.reason,
                    "decision_received"
                );
                decision
            }
            Err(kind) => {
                warn!(stage = %EventStage::DecisionDegraded, cause = %kind, "decision_unavailable");
                let fallback = fallback_decision(&kind);
                return EventOutcome::degraded(
                    event_id,
                    fallback,
                    None,
                    format!("decision_{}", kind.tag()),
                );
            }
        };

        // Stage 2: execution, bounded.
        let request = ExecutionRequest::from_decision(
            &decision,
            event.app.as_deref().unwrap_or_default(),
            event.env.as_deref().unwrap_or_default(),
            "agent",
        );

        info!(stage = %EventStage::ExecutionPending, service = self.execution.name(), "calling_execution");
        let result = match self.bounded_execute(&request).await {
            Ok(result) => {
                info!(
                    stage = %EventStage::ExecutionOk,
                    status = ?result.status,
                    execution_id = %result.execution_id,
                    "execution_received"
                );
                result
            }
            Err(kind) => {
                warn!(stage = %EventStage::ExecutionDegraded, cause = %kind, "execution_unavailable");
                let placeholder = ExecutionResult::new(ExecutionStatus::Failed, &request, false)
                    .with_reason("dependency_unavailable");
                return EventOutcome::degraded(
                    event_id,
                    decision,
                    Some(placeholder),
                    format!("execution_{}", kind.tag()),
                );
            }
        };

        // Feedback loop: only after execution completed, never after a
        // cancellation or degradation.
        if let Some(ref learner) = self.learner {
            if let Some(state) = learned_state(&decision) {
                learner.observe(state, decision.action, &result, None);
            }
        }

        info!(stage = %EventStage::Complete, "event_complete");
        EventOutcome::processed(event_id, decision, result)
    }

    async fn bounded_decide(&self, event: &EventPayload) -> Result<Decision, FailureKind> {
        match tokio::time::timeout(self.decision_timeout, self.decision.decide(event)).await {
            Ok(inner) => inner,
            Err(_) => Err(FailureKind::Timeout),
        }
    }

    async fn bounded_execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, FailureKind> {
        match tokio::time::timeout(self.execution_timeout, self.execution.execute(request)).await {
            Ok(inner) => inner,
            Err(_) => Err(FailureKind::Timeout),
        }
    }
}

/// The safe default substituted when the decision stage fails.
fn fallback_decision(kind: &FailureKind) -> Decision {
    Decision::noop("dependency_unavailable")
        .with_meta("fallback", serde_json::json!(kind.tag()))
}

/// State the decision was made from, when the learned strategy produced it.
fn learned_state(decision: &Decision) -> Option<StateId> {
    decision
        .metadata
        .get("state")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<StateId>().ok())
}

fn generate_event_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("evt_{}", &hex[..8])
}
