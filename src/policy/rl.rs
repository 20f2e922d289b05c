//! Epsilon-greedy strategy over the learned value table.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing::debug;

use crate::domain::{ActionId, Decision, RuntimeObservation};
use crate::policy::store::{Exploration, PolicyStore, StateId};

/// Adaptive strategy consulting the policy store.
///
/// With probability epsilon a uniformly random action is proposed
/// (exploration); otherwise the argmax of the state's row (exploitation),
/// ties broken by declared action order. In training mode, actions the
/// table has never valued are tried before either.
pub struct RlPolicy {
    store: Arc<PolicyStore>,
    rng: Mutex<StdRng>,
}

impl RlPolicy {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic RNG seed, for reproducible tests.
    pub fn with_seed(store: Arc<PolicyStore>, seed: u64) -> Self {
        Self {
            store,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn decide(&self, obs: &RuntimeObservation) -> Decision {
        let state = StateId::from_observation(obs);
        let exploration = self.store.exploration();
        let row = self.store.state_row(state);

        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if exploration.train_mode {
            let untried: Vec<ActionId> = row
                .iter()
                .filter(|(_, v)| *v == 0.0)
                .map(|(a, _)| *a)
                .collect();
            if !untried.is_empty() {
                let action = untried[rng.gen_range(0..untried.len())];
                debug!(%state, %action, "trying untried action");
                return self.build(state, action, 0.0, "rl_untried_action", 0.2, &exploration);
            }
        }

        if rng.gen::<f64>() < exploration.epsilon {
            let action = ActionId::ALL[rng.gen_range(0..ActionId::ALL.len())];
            let q = self.store.q_value(state, action);
            debug!(%state, %action, "exploring");
            return self.build(state, action, q, "rl_exploration", 0.2, &exploration);
        }

        let (action, q) = self.store.best_action(state);
        debug!(%state, %action, q, "exploiting");
        self.build(
            state,
            action,
            q,
            "rl_exploitation",
            confidence_from_value(q),
            &exploration,
        )
    }

    fn build(
        &self,
        state: StateId,
        action: ActionId,
        q: f64,
        reason: &str,
        confidence: f64,
        exploration: &Exploration,
    ) -> Decision {
        Decision::new(action, reason, confidence)
            .with_meta("strategy", json!("learned"))
            .with_meta("state", json!(state.as_str()))
            .with_meta("q_value", json!(q))
            .with_meta("epsilon", json!(exploration.epsilon))
            .with_meta("algorithm", json!(self.store.algorithm().as_str()))
    }
}

/// Squash a table value into a [0, 1] confidence.
fn confidence_from_value(q: f64) -> f64 {
    1.0 / (1.0 + (-q).exp())
}
