//! Learning Integration Tests
//!
//! Convergence behavior of the update rules, reward shaping with human
//! feedback, and snapshot persistence.

use std::sync::Arc;

use remedian::core::AllowlistPolicy;
use remedian::domain::ActionId;
use remedian::policy::{
    Algorithm, Exploration, Feedback, Learner, PolicyStore, StateId,
};

fn store_for(algorithm: Algorithm) -> Arc<PolicyStore> {
    Arc::new(PolicyStore::new(
        AllowlistPolicy::default(),
        algorithm,
        Exploration::serving(),
    ))
}

#[test]
fn test_repeated_reward_drives_value_monotonically_toward_reward() {
    let store = store_for(Algorithm::QLearning);
    let learner = Learner::new(Arc::clone(&store));

    let reward = 1.0;
    let mut previous = store.q_value(StateId::DeploymentFailure, ActionId::Rollback);
    assert_eq!(previous, 0.0);

    for _ in 0..100 {
        let value = learner.learn(
            StateId::DeploymentFailure,
            ActionId::Rollback,
            reward,
            None,
            StateId::Nominal,
        );
        assert!(value > previous);
        assert!(value < reward + 1e-9);
        previous = value;
    }

    // After many identical updates the value is essentially the reward.
    assert!((reward - previous) < 0.001);
}

#[test]
fn test_negative_reward_drives_value_down() {
    let store = store_for(Algorithm::QLearning);
    let learner = Learner::new(Arc::clone(&store));

    for _ in 0..50 {
        learner.learn(
            StateId::LatencyIssue,
            ActionId::Deploy,
            -1.0,
            None,
            StateId::Nominal,
        );
    }

    let value = store.q_value(StateId::LatencyIssue, ActionId::Deploy);
    assert!(value < -0.9);
}

#[test]
fn test_learned_best_action_shifts_with_experience() {
    let store = store_for(Algorithm::QLearning);
    let learner = Learner::new(Arc::clone(&store));

    // restart keeps working for anomaly_health, scale_down keeps failing.
    for _ in 0..10 {
        learner.learn(
            StateId::AnomalyHealth,
            ActionId::Restart,
            1.0,
            None,
            StateId::Nominal,
        );
        learner.learn(
            StateId::AnomalyHealth,
            ActionId::ScaleDown,
            -1.0,
            None,
            StateId::Nominal,
        );
    }

    let (best, value) = store.best_action(StateId::AnomalyHealth);
    assert_eq!(best, ActionId::Restart);
    assert!(value > 0.5);
}

#[test]
fn test_rejected_feedback_overrides_success() {
    let store = store_for(Algorithm::QLearning);
    let learner = Learner::new(Arc::clone(&store));

    // Execution succeeded (base +1) but a human rejected the remediation.
    let value = learner.learn(
        StateId::AnomalyScore,
        ActionId::Restart,
        1.0,
        Some(Feedback::Rejected),
        StateId::Nominal,
    );

    // 0 + 0.1 * (-1 - 0)
    assert!((value + 0.1).abs() < 1e-12);
}

#[test]
fn test_accepted_feedback_amplifies_reward() {
    let store = store_for(Algorithm::QLearning);
    let learner = Learner::new(Arc::clone(&store));

    let value = learner.learn(
        StateId::AnomalyScore,
        ActionId::Restart,
        1.0,
        Some(Feedback::Accepted),
        StateId::Nominal,
    );

    // 0 + 0.1 * (2 - 0)
    assert!((value - 0.2).abs() < 1e-12);
}

#[test]
fn test_algorithms_diverge_on_the_same_experience() {
    // With a valued successor state the three rules produce different
    // updates from the same (s, a, r, s') tuple. The successor value is
    // seeded through a persisted snapshot, the same way a deployment would
    // resume prior learning.
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("seed.json");
    std::fs::write(
        &path,
        r#"{"algorithm": "q_learning", "q_table": {"nominal": {"noop": 0.5}}}"#,
    )
    .unwrap();

    let mut values = Vec::new();
    for algorithm in [
        Algorithm::QLearning,
        Algorithm::DoubleDqn,
        Algorithm::ActorCritic,
    ] {
        let store = Arc::new(
            PolicyStore::open(
                &path,
                AllowlistPolicy::default(),
                algorithm,
                Exploration::serving(),
            )
            .unwrap(),
        );
        assert_eq!(store.q_value(StateId::Nominal, ActionId::Noop), 0.5);

        let learner = Learner::new(Arc::clone(&store));
        values.push(learner.learn(
            StateId::LatencyIssue,
            ActionId::ScaleUp,
            1.0,
            None,
            StateId::Nominal,
        ));
    }

    assert!((values[0] - 0.1).abs() < 1e-12); // r only
    assert!((values[1] - 0.1475).abs() < 1e-12); // bootstrapped target
    // Actor-critic: td = 1 + 0.95 * (0.5/6) - 0 = 1.0791...; new = 0.1079...
    assert!((values[2] - 0.107_916_666_666_666_67).abs() < 1e-9);
}

#[test]
fn test_snapshot_roundtrip_preserves_learning() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("q_table.json");

    {
        let store = Arc::new(
            PolicyStore::open(
                &path,
                AllowlistPolicy::default(),
                Algorithm::QLearning,
                Exploration::serving(),
            )
            .unwrap(),
        );
        let learner = Learner::new(Arc::clone(&store));
        for _ in 0..20 {
            learner.learn(
                StateId::AnomalyHealth,
                ActionId::Restart,
                1.0,
                None,
                StateId::Nominal,
            );
        }
        store.persist().unwrap();
    }

    let reopened = PolicyStore::open(
        &path,
        AllowlistPolicy::default(),
        Algorithm::QLearning,
        Exploration::serving(),
    )
    .unwrap();

    let value = reopened.q_value(StateId::AnomalyHealth, ActionId::Restart);
    assert!(value > 0.8, "persisted value lost: {value}");
    assert_eq!(reopened.best_action(StateId::AnomalyHealth).0, ActionId::Restart);
}

#[test]
fn test_corrupt_snapshot_is_an_error_not_a_panic() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("q_table.json");
    std::fs::write(&path, "this is not a snapshot").unwrap();

    assert!(PolicyStore::open(
        &path,
        AllowlistPolicy::default(),
        Algorithm::QLearning,
        Exploration::serving(),
    )
    .is_err());
}

#[test]
fn test_persist_fully_replaces_previous_snapshot() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("q_table.json");

    let open = || {
        PolicyStore::open(
            &path,
            AllowlistPolicy::default(),
            Algorithm::QLearning,
            Exploration::serving(),
        )
        .map(Arc::new)
        .unwrap()
    };

    let store = open();
    let learner = Learner::new(Arc::clone(&store));
    learner.learn(
        StateId::AnomalyScore,
        ActionId::Restart,
        1.0,
        None,
        StateId::Nominal,
    );
    store.persist().unwrap();

    let first = std::fs::read_to_string(&path).unwrap();

    let store = open();
    let learner = Learner::new(Arc::clone(&store));
    learner.learn(
        StateId::AnomalyScore,
        ActionId::Restart,
        1.0,
        None,
        StateId::Nominal,
    );
    store.persist().unwrap();

    // The new snapshot replaces the old one outright: it parses cleanly and
    // carries the advanced value.
    let second = std::fs::read_to_string(&path).unwrap();
    assert_ne!(first, second);

    let reopened = open();
    let value = reopened.q_value(StateId::AnomalyScore, ActionId::Restart);
    assert!((value - 0.19).abs() < 1e-12); // 0.1 then 0.1 + 0.1*(1-0.1)
}
