//! Feedback adapter: turns execution outcomes into rewards and applies the
//! selected update rule to the value table.
//!
//! Updates run under the store's mutex so concurrent events learning about
//! the same state never lose writes. Each update appends its experience
//! tuple and is published for observers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::domain::{ActionId, ExecutionResult};
use crate::policy::store::{Algorithm, Experience, PolicyStore, StateId};

/// Default learning rate.
pub const DEFAULT_ALPHA: f64 = 0.1;

/// Default discount factor for the bootstrapped rules.
pub const DEFAULT_GAMMA: f64 = 0.95;

/// Optional human verdict on an executed remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Accepted,
    Rejected,
}

/// One observable value-table update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedUpdate {
    pub state: StateId,
    pub action: ActionId,
    pub reward: f64,
    pub new_value: f64,
    pub algorithm: Algorithm,
}

/// Applies rewards to the policy store.
pub struct Learner {
    store: Arc<PolicyStore>,
    alpha: f64,
    gamma: f64,
    updates: broadcast::Sender<LearnedUpdate>,
}

impl Learner {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            store,
            alpha: DEFAULT_ALPHA,
            gamma: DEFAULT_GAMMA,
            updates,
        }
    }

    pub fn with_hyperparameters(mut self, alpha: f64, gamma: f64) -> Self {
        self.alpha = alpha;
        self.gamma = gamma;
        self
    }

    /// Subscribe to update notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LearnedUpdate> {
        self.updates.subscribe()
    }

    /// Shape the reward for an execution outcome.
    ///
    /// Base reward is +1 on success, -1 otherwise. `accepted` feedback adds
    /// +1; `rejected` forces -1 regardless of the base value.
    pub fn reward_for(result: &ExecutionResult, feedback: Option<Feedback>) -> f64 {
        let base = if result.succeeded() { 1.0 } else { -1.0 };
        match feedback {
            Some(Feedback::Accepted) => base + 1.0,
            Some(Feedback::Rejected) => -1.0,
            None => base,
        }
    }

    /// Convenience wrapper: shape the reward from an execution result and
    /// learn with the nominal state as the (terminal) successor.
    pub fn observe(
        &self,
        state: StateId,
        action: ActionId,
        result: &ExecutionResult,
        feedback: Option<Feedback>,
    ) -> f64 {
        let base = if result.succeeded() { 1.0 } else { -1.0 };
        self.learn(state, action, base, feedback, StateId::Nominal)
    }

    /// Apply one learning update; returns the new table value.
    pub fn learn(
        &self,
        state: StateId,
        action: ActionId,
        base_reward: f64,
        feedback: Option<Feedback>,
        next_state: StateId,
    ) -> f64 {
        let reward = match feedback {
            Some(Feedback::Accepted) => base_reward + 1.0,
            Some(Feedback::Rejected) => -1.0,
            None => base_reward,
        };
        let algorithm = self.store.algorithm();

        let new_value = {
            let mut inner = self.store.lock();

            inner.push_experience(Experience {
                state,
                action,
                reward,
                next_state,
            });

            let old_value = inner.q_table.get(state, action);
            let new_value = match algorithm {
                Algorithm::QLearning => {
                    // Zero-discount single-step update: the successor is
                    // treated as terminal for the immediate decision cycle.
                    old_value + self.alpha * (reward - old_value)
                }
                Algorithm::DoubleDqn => {
                    let (best_next, _) = inner.q_table.best_action(next_state);
                    let target = reward + self.gamma * inner.q_table.get(next_state, best_next);
                    old_value + self.alpha * (target - old_value)
                }
                Algorithm::ActorCritic => {
                    let state_value = inner.q_table.mean(state);
                    let next_value = inner.q_table.mean(next_state);
                    let td_error = reward + self.gamma * next_value - state_value;
                    old_value + self.alpha * td_error
                }
            };
            inner.q_table.set(state, action, new_value);

            if inner.exploration.train_mode {
                inner.exploration.epsilon = (inner.exploration.epsilon
                    * inner.exploration.decay)
                    .max(inner.exploration.floor);
            }

            new_value
        };

        info!(
            %state,
            %action,
            reward,
            new_value,
            algorithm = %algorithm,
            "rl_update"
        );

        // Receivers are optional; a send with none listening is fine.
        let _ = self.updates.send(LearnedUpdate {
            state,
            action,
            reward,
            new_value,
            algorithm,
        });

        new_value
    }
}
