//! Decision policies.
//!
//! Two interchangeable strategies produce identical decision shapes: a
//! deterministic rule table and an adaptive learned policy. The engine
//! wrapping them owns the validation gate and is infallible — any failure
//! becomes a noop decision with a reason tag, never an error to the caller.

pub mod learner;
pub mod rl;
pub mod rules;
pub mod store;

use std::str::FromStr;

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::adapters::{DecisionService, FailureKind};
use crate::domain::{Decision, EventPayload, RuntimeObservation};

pub use learner::{Feedback, LearnedUpdate, Learner};
pub use rl::RlPolicy;
pub use rules::RulePolicy;
pub use store::{Algorithm, Experience, Exploration, PolicyStore, QTable, StateId, StoreError};

/// Which strategy the engine runs with, selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    Rules,
    Learned,
}

impl FromStr for PolicyMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rules" => Ok(PolicyMode::Rules),
            "learned" => Ok(PolicyMode::Learned),
            _ => Err(()),
        }
    }
}

/// The closed set of decision strategies.
pub enum DecisionStrategy {
    Rules(RulePolicy),
    Learned(RlPolicy),
}

impl DecisionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            DecisionStrategy::Rules(_) => "rules",
            DecisionStrategy::Learned(_) => "learned",
        }
    }

    fn decide(&self, obs: &RuntimeObservation) -> Decision {
        match self {
            DecisionStrategy::Rules(policy) => policy.decide(obs),
            DecisionStrategy::Learned(policy) => policy.decide(obs),
        }
    }
}

/// The decision policy engine.
///
/// `decide` never fails: malformed input produces a noop decision whose
/// reason names the failing check.
pub struct DecisionEngine {
    strategy: DecisionStrategy,
}

impl DecisionEngine {
    pub fn new(strategy: DecisionStrategy) -> Self {
        Self { strategy }
    }

    #[instrument(skip_all, fields(strategy = self.strategy.name()))]
    pub fn decide(&self, payload: &EventPayload) -> Decision {
        match RuntimeObservation::from_payload(payload) {
            Ok(obs) => {
                let decision = self.strategy.decide(&obs);
                tracing::info!(
                    app = %obs.app_id,
                    env = %obs.environment,
                    decision = %decision.action,
                    reason = %decision.reason,
                    confidence = decision.confidence,
                    "decision_made"
                );
                decision
            }
            Err(err) => {
                warn!(reason = %err.reason_tag(), "input_validation_failed");
                Decision::noop(err.reason_tag())
                    .with_meta("validation_error", serde_json::json!(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl DecisionService for DecisionEngine {
    fn name(&self) -> &str {
        "in_process_engine"
    }

    async fn decide(&self, payload: &EventPayload) -> Result<Decision, FailureKind> {
        Ok(DecisionEngine::decide(self, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionId;
    use serde_json::json;

    fn engine() -> DecisionEngine {
        DecisionEngine::new(DecisionStrategy::Rules(RulePolicy::new()))
    }

    #[test]
    fn test_empty_payload_yields_noop() {
        let payload: EventPayload = serde_json::from_value(json!({})).unwrap();
        let decision = engine().decide(&payload);

        assert_eq!(decision.action, ActionId::Noop);
        assert_eq!(decision.reason, "invalid_input_empty_payload");
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_invalid_environment_yields_noop() {
        let payload: EventPayload = serde_json::from_value(json!({
            "event_type": "health_check",
            "app": "billing",
            "env": "qa",
            "metadata": {"state": "critical"}
        }))
        .unwrap();

        let decision = engine().decide(&payload);
        assert_eq!(decision.action, ActionId::Noop);
        assert_eq!(decision.reason, "invalid_environment");
    }

    #[test]
    fn test_valid_payload_reaches_strategy() {
        let payload: EventPayload = serde_json::from_value(json!({
            "event_type": "health_check",
            "app": "billing",
            "env": "prod",
            "metadata": {"state": "critical", "errors_last_min": 15}
        }))
        .unwrap();

        let decision = engine().decide(&payload);
        assert_eq!(decision.action, ActionId::Restart);
        assert_eq!(decision.reason, "state_critical");
        assert_eq!(decision.confidence, 0.9);
    }

    #[test]
    fn test_policy_mode_parse() {
        assert_eq!("rules".parse::<PolicyMode>(), Ok(PolicyMode::Rules));
        assert_eq!("learned".parse::<PolicyMode>(), Ok(PolicyMode::Learned));
        assert!("neural".parse::<PolicyMode>().is_err());
    }
}
