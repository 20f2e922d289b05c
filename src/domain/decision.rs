//! Decisions and the fixed remediation action vocabulary.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remediation actions the system can propose.
///
/// The declaration order is load-bearing: it is the tie-break order for
/// value-table argmax and the display order of allowed-action sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionId {
    Noop,
    Restart,
    ScaleUp,
    ScaleDown,
    Deploy,
    Rollback,
}

impl ActionId {
    pub const ALL: [ActionId; 6] = [
        ActionId::Noop,
        ActionId::Restart,
        ActionId::ScaleUp,
        ActionId::ScaleDown,
        ActionId::Deploy,
        ActionId::Rollback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionId::Noop => "noop",
            ActionId::Restart => "restart",
            ActionId::ScaleUp => "scale_up",
            ActionId::ScaleDown => "scale_down",
            ActionId::Deploy => "deploy",
            ActionId::Rollback => "rollback",
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noop" => Ok(ActionId::Noop),
            "restart" => Ok(ActionId::Restart),
            "scale_up" => Ok(ActionId::ScaleUp),
            "scale_down" => Ok(ActionId::ScaleDown),
            "deploy" => Ok(ActionId::Deploy),
            "rollback" => Ok(ActionId::Rollback),
            _ => Err(()),
        }
    }
}

/// A candidate action produced by the policy engine.
///
/// Produced exactly once per observation and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// The proposed action.
    #[serde(rename = "decision")]
    pub action: ActionId,

    /// Machine-readable reason tag (e.g. `state_critical`, `invalid_app`).
    pub reason: String,

    /// Policy confidence in [0, 1].
    pub confidence: f64,

    /// When the decision was produced.
    pub produced_at: DateTime<Utc>,

    /// Strategy-specific context (rule matched, value-table state, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Decision {
    pub fn new(action: ActionId, reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            action,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
            produced_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// The universal safe default: take no action.
    ///
    /// Used for validation failures and as the degraded-mode fallback, so
    /// confidence is zero.
    pub fn noop(reason: impl Into<String>) -> Self {
        Self::new(ActionId::Noop, reason, 0.0)
    }

    /// Attach a metadata entry.
    pub fn with_meta(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}
