//! Core pipeline logic.
//!
//! This module contains:
//! - AllowlistPolicy: per-environment permitted actions
//! - ExecutionGateway: validation, allowlist enforcement, execute/simulate
//! - EventOrchestrator: bounded decision→execution pipeline per event

pub mod allowlist;
pub mod gateway;
pub mod orchestrator;

// Re-export commonly used types
pub use allowlist::AllowlistPolicy;
pub use gateway::{ExecutionGateway, GatewayRejection};
pub use orchestrator::{EventOrchestrator, DEFAULT_STAGE_TIMEOUT};
