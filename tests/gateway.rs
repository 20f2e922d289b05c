//! Execution Gateway Integration Tests
//!
//! Allowlist enforcement across every environment/action pair, plus the
//! simulate-mode contract.

use std::sync::Arc;

use remedian::adapters::LogOnlyInfra;
use remedian::core::{AllowlistPolicy, ExecutionGateway};
use remedian::domain::{ActionId, Environment, ExecutionRequest, ExecutionStatus};
use remedian::policy::{Algorithm, Exploration, PolicyStore};

fn gateway(simulate: bool) -> ExecutionGateway {
    let store = Arc::new(PolicyStore::new(
        AllowlistPolicy::default(),
        Algorithm::QLearning,
        Exploration::serving(),
    ));
    ExecutionGateway::new(store, Arc::new(LogOnlyInfra), simulate)
}

fn request(action: &str, env: &str) -> ExecutionRequest {
    ExecutionRequest {
        action: Some(action.to_string()),
        app: Some("billing".to_string()),
        env: Some(env.to_string()),
        requested_by: Some("agent".to_string()),
        decision_metadata: Default::default(),
    }
}

#[tokio::test]
async fn test_allowlist_enforced_for_every_pair() {
    let policy = AllowlistPolicy::default();
    let gateway = gateway(true);

    for env in Environment::ALL {
        for action in ActionId::ALL {
            let result = gateway.execute(&request(action.as_str(), env.as_str())).await;

            if policy.is_allowed(env, action) {
                assert_eq!(
                    result.status,
                    ExecutionStatus::Simulated,
                    "{action} in {env} should pass the allowlist"
                );
            } else {
                assert_eq!(
                    result.status,
                    ExecutionStatus::Rejected,
                    "{action} in {env} should be rejected"
                );
                assert_eq!(result.reason.as_deref(), Some("action_out_of_scope"));
                assert_eq!(result.allowed_actions, Some(policy.allowed_for(env)));
            }
        }
    }
}

#[tokio::test]
async fn test_rule_suggested_scale_up_still_rejected_in_prod() {
    // The rule table proposes scale_up for high latency, but prod only
    // permits restart and noop; the gate wins.
    let result = gateway(true).execute(&request("scale_up", "prod")).await;

    assert_eq!(result.status, ExecutionStatus::Rejected);
    assert_eq!(result.reason.as_deref(), Some("action_out_of_scope"));
    assert_eq!(
        result.allowed_actions,
        Some(vec![ActionId::Noop, ActionId::Restart])
    );
}

#[tokio::test]
async fn test_simulate_flag_switches_status_only() {
    let simulated = gateway(true).execute(&request("restart", "prod")).await;
    let executed = gateway(false).execute(&request("restart", "prod")).await;

    assert_eq!(simulated.status, ExecutionStatus::Simulated);
    assert!(simulated.demo_mode);
    assert_eq!(executed.status, ExecutionStatus::Executed);
    assert!(!executed.demo_mode);

    // Same shape either way.
    assert_eq!(simulated.action, executed.action);
    assert_eq!(simulated.env, executed.env);
    assert!(simulated.execution_id.starts_with("exec_"));
    assert!(executed.execution_id.starts_with("exec_"));
}

#[tokio::test]
async fn test_validation_failures_never_panic() {
    let gateway = gateway(true);

    let cases = [
        ExecutionRequest::default(),
        request("", "prod"),
        request("restart", ""),
        request("restart", "moon"),
        ExecutionRequest {
            action: Some("restart".to_string()),
            ..Default::default()
        },
    ];

    for req in cases {
        let result = gateway.execute(&req).await;
        assert_eq!(result.status, ExecutionStatus::Rejected);
        assert!(result.reason.is_some());
    }
}

#[tokio::test]
async fn test_custom_allowlist_is_honored() {
    use std::collections::{BTreeMap, BTreeSet};

    let mut allowed = BTreeMap::new();
    allowed.insert(
        Environment::Prod,
        BTreeSet::from([ActionId::Noop, ActionId::Rollback]),
    );
    let store = Arc::new(PolicyStore::new(
        AllowlistPolicy::new(allowed),
        Algorithm::QLearning,
        Exploration::serving(),
    ));
    let gateway = ExecutionGateway::new(store, Arc::new(LogOnlyInfra), true);

    let rollback = gateway.execute(&request("rollback", "prod")).await;
    assert_eq!(rollback.status, ExecutionStatus::Simulated);

    let restart = gateway.execute(&request("restart", "prod")).await;
    assert_eq!(restart.status, ExecutionStatus::Rejected);

    // Environments missing from the custom table permit nothing.
    let dev = gateway.execute(&request("noop", "dev")).await;
    assert_eq!(dev.status, ExecutionStatus::Rejected);
}
