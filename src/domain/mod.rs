//! Data structures shared across the pipeline.
//!
//! Every message crossing a component boundary has a closed, typed shape:
//! the untyped inbound event payload is validated exactly once, at the edge,
//! into a `RuntimeObservation`; everything downstream works with enums.

pub mod decision;
pub mod execution;
pub mod observation;
pub mod outcome;

pub use decision::{ActionId, Decision};
pub use execution::{ExecutionRequest, ExecutionResult, ExecutionStatus};
pub use observation::{
    Environment, EventPayload, HealthState, RuntimeObservation, ValidationError,
};
pub use outcome::{EventOutcome, EventStage, PipelineStatus};
