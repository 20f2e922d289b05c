//! Deterministic rule-table strategy.
//!
//! Stateless and fully reproducible: the same observation always yields the
//! same action, reason, and confidence. Rules are checked in priority order
//! and the first match wins; critical health dominates every other signal.

use serde_json::json;

use crate::domain::{ActionId, Decision, HealthState, RuntimeObservation};

/// Error counts above this trigger a restart.
pub const ERROR_COUNT_THRESHOLD: i64 = 10;

/// Latency (ms) above this triggers a scale-up.
pub const LATENCY_THRESHOLD_MS: f64 = 5000.0;

/// The fixed rule table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulePolicy;

impl RulePolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, obs: &RuntimeObservation) -> Decision {
        if obs.health_state == HealthState::Critical {
            return Decision::new(ActionId::Restart, "state_critical", 0.9)
                .with_meta("rule_matched", json!("critical_state"))
                .with_meta("strategy", json!("rules"));
        }

        let error_count = obs.error_count.unwrap_or(0);
        if error_count > ERROR_COUNT_THRESHOLD {
            return Decision::new(ActionId::Restart, "error_count_exceeded_threshold", 0.85)
                .with_meta("rule_matched", json!("high_error_count"))
                .with_meta("error_count", json!(error_count))
                .with_meta("strategy", json!("rules"));
        }

        let latency_ms = obs.latency_ms.unwrap_or(0.0);
        if latency_ms > LATENCY_THRESHOLD_MS {
            return Decision::new(ActionId::ScaleUp, "high_latency_detected", 0.75)
                .with_meta("rule_matched", json!("high_latency"))
                .with_meta("latency_ms", json!(latency_ms))
                .with_meta("strategy", json!("rules"));
        }

        Decision::new(ActionId::Noop, "no_action_required", 0.95)
            .with_meta("rule_matched", json!("default_safe"))
            .with_meta("strategy", json!("rules"))
    }
}
