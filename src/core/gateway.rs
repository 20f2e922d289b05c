//! Execution gateway: validation, allowlist enforcement, execute/simulate.
//!
//! Every candidate action passes through here, no matter which strategy
//! proposed it. `execute` never fails: invalid or disallowed requests come
//! back as `rejected` results, infrastructure faults as `failed` ones.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::adapters::InfraAdapter;
use crate::domain::{
    ActionId, Environment, ExecutionRequest, ExecutionResult, ExecutionStatus,
};
use crate::policy::PolicyStore;

/// Why a request was rejected before reaching infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayRejection {
    #[error("empty_payload")]
    EmptyPayload,

    #[error("missing_required_field_{field}")]
    MissingField { field: &'static str },

    #[error("{field}_must_be_non_empty_string")]
    BlankField { field: &'static str },

    #[error("invalid_environment")]
    InvalidEnvironment,

    #[error("action_out_of_scope")]
    ActionOutOfScope { allowed: Vec<ActionId> },
}

/// The gateway. The simulate flag is fixed at construction and applies to
/// the whole process; it cannot be toggled per request.
pub struct ExecutionGateway {
    store: Arc<PolicyStore>,
    infra: Arc<dyn InfraAdapter>,
    simulate: bool,
}

impl ExecutionGateway {
    pub fn new(store: Arc<PolicyStore>, infra: Arc<dyn InfraAdapter>, simulate: bool) -> Self {
        Self {
            store,
            infra,
            simulate,
        }
    }

    pub fn simulate_mode(&self) -> bool {
        self.simulate
    }

    /// Validate, enforce the allowlist, then execute or simulate.
    #[instrument(skip_all, fields(action = request.action.as_deref().unwrap_or("unknown")))]
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let (action, env) = match self.validate(request) {
            Ok(pair) => pair,
            Err(rejection) => {
                warn!(reason = %rejection, "action_rejected");
                let mut result =
                    ExecutionResult::rejected(request, rejection.to_string(), self.simulate);
                if let GatewayRejection::ActionOutOfScope { allowed, .. } = rejection {
                    result = result.with_allowed_actions(allowed);
                }
                return result;
            }
        };

        let app = request.app.as_deref().unwrap_or_default();

        if self.simulate {
            info!(%action, app, %env, "action_simulated");
            return ExecutionResult::new(ExecutionStatus::Simulated, request, true);
        }

        match self.infra.apply(action, app, env).await {
            Ok(()) => {
                info!(%action, app, %env, infra = self.infra.name(), "action_executed");
                ExecutionResult::new(ExecutionStatus::Executed, request, false)
            }
            Err(e) => {
                warn!(%action, app, %env, error = %e, "action_failed");
                ExecutionResult::new(ExecutionStatus::Failed, request, false)
                    .with_reason(format!("infrastructure_error: {e}"))
            }
        }
    }

    /// Field checks run in a fixed order and the first failure wins:
    /// emptiness, presence, non-blank strings, environment, allowlist.
    fn validate(&self, request: &ExecutionRequest) -> Result<(ActionId, Environment), GatewayRejection> {
        if request.is_empty() {
            return Err(GatewayRejection::EmptyPayload);
        }

        let fields: [(&'static str, &Option<String>); 4] = [
            ("action", &request.action),
            ("app", &request.app),
            ("env", &request.env),
            ("requested_by", &request.requested_by),
        ];

        for (name, value) in fields {
            if value.is_none() {
                return Err(GatewayRejection::MissingField { field: name });
            }
        }
        for (name, value) in fields {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(GatewayRejection::BlankField { field: name });
            }
        }

        let env_raw = request.env.as_deref().unwrap_or_default();
        let env = env_raw
            .parse::<Environment>()
            .map_err(|_| GatewayRejection::InvalidEnvironment)?;

        // An unknown action name is indistinguishable from a known-but-
        // disallowed one at this boundary: both are out of scope.
        let allowlist = self.store.allowlist();
        let action_raw = request.action.as_deref().unwrap_or_default();
        match action_raw.parse::<ActionId>() {
            Ok(action) if allowlist.is_allowed(env, action) => Ok((action, env)),
            _ => Err(GatewayRejection::ActionOutOfScope {
                allowed: allowlist.allowed_for(env),
            }),
        }
    }
}

#[async_trait::async_trait]
impl crate::adapters::ExecutionService for ExecutionGateway {
    fn name(&self) -> &str {
        "in_process_gateway"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, crate::adapters::FailureKind> {
        Ok(ExecutionGateway::execute(self, request).await)
    }
}
