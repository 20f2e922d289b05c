//! Inbound event payloads and their validation into typed observations.
//!
//! The wire payload is deliberately loose (every field optional, free-form
//! metadata map) so that malformed input can be inspected rather than
//! rejected at deserialization. Turning a payload into a
//! `RuntimeObservation` is the single validation gate; past it, all values
//! are typed and trusted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deployment environment an application runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Dev,
    Stage,
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Stage, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Stage => "stage",
            Environment::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Environment::Dev),
            "stage" => Ok(Environment::Stage),
            "prod" => Ok(Environment::Prod),
            _ => Err(()),
        }
    }
}

/// Reported health of an application at observation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Critical,
    Unknown,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Critical => "critical",
            HealthState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(HealthState::Healthy),
            "degraded" => Ok(HealthState::Degraded),
            "critical" => Ok(HealthState::Critical),
            "unknown" => Ok(HealthState::Unknown),
            _ => Err(()),
        }
    }
}

/// Raw inbound runtime event, exactly as received.
///
/// `metadata` carries the health state and optional metrics:
/// `state`, `latency_ms`, `errors_last_min` (or `error_count`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl EventPayload {
    /// True when the payload carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.event_type.is_none()
            && self.app.is_none()
            && self.env.is_none()
            && self.metadata.is_empty()
    }
}

/// Validation failures for inbound payloads.
///
/// Each variant maps to a stable reason tag surfaced in the noop decision,
/// so callers can tell exactly which check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload cannot be empty")]
    EmptyPayload,

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("environment must be one of dev, stage, prod (got {value:?})")]
    InvalidEnvironment { value: String },

    #[error("state must be one of healthy, degraded, critical, unknown (got {value:?})")]
    InvalidHealthState { value: String },

    #[error("app must be a non-empty string")]
    EmptyApp,

    #[error("metric {field} must be a non-negative number")]
    MalformedNumericField { field: &'static str },
}

impl ValidationError {
    /// Stable machine-readable tag for this failure class.
    pub fn reason_tag(&self) -> String {
        match self {
            ValidationError::EmptyPayload => "invalid_input_empty_payload".to_string(),
            ValidationError::MissingField { field } => {
                format!("missing_required_field_{field}")
            }
            ValidationError::InvalidEnvironment { .. } => "invalid_environment".to_string(),
            ValidationError::InvalidHealthState { .. } => "invalid_health_state".to_string(),
            ValidationError::EmptyApp => "invalid_app".to_string(),
            ValidationError::MalformedNumericField { field } => {
                format!("malformed_numeric_field_{field}")
            }
        }
    }
}

/// A validated runtime observation, created once per inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeObservation {
    pub app_id: String,
    pub environment: Environment,
    pub health_state: HealthState,
    pub event_type: Option<String>,
    pub latency_ms: Option<f64>,
    pub error_count: Option<i64>,
    pub observed_at: DateTime<Utc>,
}

impl RuntimeObservation {
    /// Validate an inbound payload into a typed observation.
    ///
    /// Checks run in a fixed order and the first failure wins: required
    /// fields, environment, health state, app id, optional metrics.
    pub fn from_payload(payload: &EventPayload) -> Result<Self, ValidationError> {
        if payload.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }

        let app = payload
            .app
            .as_deref()
            .ok_or(ValidationError::MissingField { field: "app" })?;
        let env = payload
            .env
            .as_deref()
            .ok_or(ValidationError::MissingField { field: "env" })?;
        let state = payload
            .metadata
            .get("state")
            .and_then(|v| v.as_str())
            .ok_or(ValidationError::MissingField { field: "state" })?;

        let environment = env
            .parse::<Environment>()
            .map_err(|_| ValidationError::InvalidEnvironment {
                value: env.to_string(),
            })?;

        let health_state =
            state
                .parse::<HealthState>()
                .map_err(|_| ValidationError::InvalidHealthState {
                    value: state.to_string(),
                })?;

        if app.trim().is_empty() {
            return Err(ValidationError::EmptyApp);
        }

        let latency_ms = metric_f64(&payload.metadata, "latency_ms")?;
        let error_count = match metric_i64(&payload.metadata, "errors_last_min")? {
            Some(n) => Some(n),
            None => metric_i64(&payload.metadata, "error_count")?,
        };

        Ok(Self {
            app_id: app.to_string(),
            environment,
            health_state,
            event_type: payload.event_type.clone(),
            latency_ms,
            error_count,
            observed_at: Utc::now(),
        })
    }
}

fn metric_f64(
    metadata: &BTreeMap<String, serde_json::Value>,
    field: &'static str,
) -> Result<Option<f64>, ValidationError> {
    match metadata.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => match value.as_f64() {
            Some(n) if n >= 0.0 => Ok(Some(n)),
            _ => Err(ValidationError::MalformedNumericField { field }),
        },
    }
}

fn metric_i64(
    metadata: &BTreeMap<String, serde_json::Value>,
    field: &'static str,
) -> Result<Option<i64>, ValidationError> {
    match metadata.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => match value.as_i64() {
            Some(n) if n >= 0 => Ok(Some(n)),
            _ => Err(ValidationError::MalformedNumericField { field }),
        },
    }
}
