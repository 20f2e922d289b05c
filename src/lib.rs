//! remedian - Runtime remediation pipeline
//!
//! Detects abnormal application runtime conditions and selects a bounded,
//! safe remediation action.
//!
//! # Architecture
//!
//! Each inbound event flows through a two-stage pipeline:
//! - A decision policy (deterministic rule table or learned value table)
//!   converts the observation into a candidate action
//! - An execution gateway validates the action against a per-environment
//!   allowlist and executes or simulates it
//!
//! The orchestrator bounds both stages with timeouts and substitutes a safe
//! noop fallback on any downstream failure, so callers always receive a
//! structured outcome.
//!
//! # Modules
//!
//! - `adapters`: Service seams (in-process or remote HTTP downstreams)
//! - `core`: Orchestrator, execution gateway, allowlist
//! - `policy`: Decision strategies, value-table store, reward learner
//! - `domain`: Typed messages (observation, decision, request, result)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process one event through the pipeline
//! echo '{"event_type":"health_check","app":"billing","env":"prod",
//!        "metadata":{"state":"critical"}}' | remedian emit
//!
//! # Inspect the learned value table
//! remedian qtable
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod policy;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use core::{AllowlistPolicy, EventOrchestrator, ExecutionGateway};
pub use domain::{
    ActionId, Decision, Environment, EventOutcome, EventPayload, ExecutionRequest,
    ExecutionResult, ExecutionStatus, HealthState, PipelineStatus, RuntimeObservation,
};
pub use policy::{
    Algorithm, DecisionEngine, DecisionStrategy, Feedback, Learner, PolicyMode, PolicyStore,
    QTable, RlPolicy, RulePolicy, StateId,
};
