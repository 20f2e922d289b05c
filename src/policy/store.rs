//! The policy store: learned value table, exploration state, experience
//! buffer, and allowlist configuration.
//!
//! One store instance is shared across all concurrent event-processing
//! units. All mutable learner state sits behind a single mutex so
//! read-modify-write updates are serialized; the lock is never held across
//! an await point. Snapshots persist atomically (write to a temp file in
//! the target directory, then rename over the old one).

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::allowlist::AllowlistPolicy;
use crate::domain::{ActionId, HealthState, RuntimeObservation};
use crate::policy::rules::{ERROR_COUNT_THRESHOLD, LATENCY_THRESHOLD_MS};

/// Default capacity of the experience ring buffer.
pub const EXPERIENCE_CAPACITY: usize = 1000;

/// Abstract situations the learned policy distinguishes.
///
/// Declaration order is the iteration order of the value table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateId {
    DeploymentFailure,
    LatencyIssue,
    AnomalyScore,
    AnomalyHealth,
    Nominal,
}

impl StateId {
    pub const ALL: [StateId; 5] = [
        StateId::DeploymentFailure,
        StateId::LatencyIssue,
        StateId::AnomalyScore,
        StateId::AnomalyHealth,
        StateId::Nominal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateId::DeploymentFailure => "deployment_failure",
            StateId::LatencyIssue => "latency_issue",
            StateId::AnomalyScore => "anomaly_score",
            StateId::AnomalyHealth => "anomaly_health",
            StateId::Nominal => "nominal",
        }
    }

    /// Collapse an observation into its learning state.
    ///
    /// Deployment-flavored events dominate, then unhealthy state, then the
    /// metric thresholds shared with the rule strategy.
    pub fn from_observation(obs: &RuntimeObservation) -> StateId {
        if let Some(event_type) = obs.event_type.as_deref() {
            if event_type.contains("deploy") {
                return StateId::DeploymentFailure;
            }
        }
        match obs.health_state {
            HealthState::Critical | HealthState::Degraded => return StateId::AnomalyHealth,
            HealthState::Healthy | HealthState::Unknown => {}
        }
        if obs.latency_ms.unwrap_or(0.0) > LATENCY_THRESHOLD_MS {
            return StateId::LatencyIssue;
        }
        if obs.error_count.unwrap_or(0) > ERROR_COUNT_THRESHOLD {
            return StateId::AnomalyScore;
        }
        StateId::Nominal
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateId::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or(())
    }
}

/// Selectable learning update rule, persisted alongside the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    QLearning,
    DoubleDqn,
    ActorCritic,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::QLearning
    }
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::QLearning => "q_learning",
            Algorithm::DoubleDqn => "double_dqn",
            Algorithm::ActorCritic => "actor_critic",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "q_learning" => Ok(Algorithm::QLearning),
            "double_dqn" => Ok(Algorithm::DoubleDqn),
            "actor_critic" => Ok(Algorithm::ActorCritic),
            _ => Err(()),
        }
    }
}

/// One learning sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub state: StateId,
    pub action: ActionId,
    pub reward: f64,
    pub next_state: StateId,
}

/// Tabular value function over every (state, action) pair.
///
/// Invariant: the table always holds an entry for every pair in
/// `StateId::ALL x ActionId::ALL`. Loading a partial snapshot re-fills the
/// gaps with zero rather than dropping states.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QTable {
    values: BTreeMap<StateId, BTreeMap<ActionId, f64>>,
}

impl Default for QTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl QTable {
    pub fn zeroed() -> Self {
        let mut values = BTreeMap::new();
        for state in StateId::ALL {
            let row: BTreeMap<ActionId, f64> =
                ActionId::ALL.into_iter().map(|a| (a, 0.0)).collect();
            values.insert(state, row);
        }
        Self { values }
    }

    /// Restore the full-population invariant after deserializing.
    pub fn fill_missing(&mut self) {
        for state in StateId::ALL {
            let row = self.values.entry(state).or_default();
            for action in ActionId::ALL {
                row.entry(action).or_insert(0.0);
            }
        }
    }

    pub fn get(&self, state: StateId, action: ActionId) -> f64 {
        self.values
            .get(&state)
            .and_then(|row| row.get(&action))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, state: StateId, action: ActionId, value: f64) {
        self.values.entry(state).or_default().insert(action, value);
    }

    /// Best action for a state; ties broken by declared action order.
    pub fn best_action(&self, state: StateId) -> (ActionId, f64) {
        let mut best = (ActionId::ALL[0], self.get(state, ActionId::ALL[0]));
        for action in ActionId::ALL.into_iter().skip(1) {
            let value = self.get(state, action);
            if value > best.1 {
                best = (action, value);
            }
        }
        best
    }

    /// All (action, value) pairs for a state, in declared order.
    pub fn row(&self, state: StateId) -> Vec<(ActionId, f64)> {
        ActionId::ALL
            .into_iter()
            .map(|a| (a, self.get(state, a)))
            .collect()
    }

    /// Mean value across actions for a state (the critic estimate).
    pub fn mean(&self, state: StateId) -> f64 {
        let sum: f64 = ActionId::ALL.iter().map(|&a| self.get(state, a)).sum();
        sum / ActionId::ALL.len() as f64
    }
}

/// Epsilon-greedy exploration parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Exploration {
    pub epsilon: f64,
    pub decay: f64,
    pub floor: f64,
    pub train_mode: bool,
}

impl Exploration {
    /// Serving mode: small fixed epsilon, no decay.
    pub fn serving() -> Self {
        Self {
            epsilon: 0.1,
            decay: 1.0,
            floor: 0.1,
            train_mode: false,
        }
    }

    /// Training mode: higher starting epsilon decaying geometrically.
    pub fn training() -> Self {
        Self {
            epsilon: 0.2,
            decay: 0.995,
            floor: 0.01,
            train_mode: true,
        }
    }
}

/// Persisted form of the store.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    algorithm: Algorithm,
    q_table: QTable,
}

/// Mutable learner state, guarded as one unit.
pub(crate) struct StoreInner {
    pub(crate) q_table: QTable,
    pub(crate) experiences: VecDeque<Experience>,
    pub(crate) exploration: Exploration,
}

impl StoreInner {
    /// Append an experience, evicting oldest-first at capacity.
    pub(crate) fn push_experience(&mut self, experience: Experience) {
        if self.experiences.len() >= EXPERIENCE_CAPACITY {
            self.experiences.pop_front();
        }
        self.experiences.push_back(experience);
    }
}

/// Errors from store persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("atomic rename failed: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Long-lived singleton owning the learned table and allowlist.
pub struct PolicyStore {
    inner: Mutex<StoreInner>,
    allowlist: AllowlistPolicy,
    algorithm: Algorithm,
    path: Option<PathBuf>,
}

impl PolicyStore {
    /// Fresh zero-initialized store with no persistence path.
    pub fn new(allowlist: AllowlistPolicy, algorithm: Algorithm, exploration: Exploration) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                q_table: QTable::zeroed(),
                experiences: VecDeque::new(),
                exploration,
            }),
            allowlist,
            algorithm,
            path: None,
        }
    }

    /// Open a store backed by a snapshot file.
    ///
    /// A missing or empty file yields a zero-initialized table. A snapshot
    /// saved under a different algorithm keeps its values but runs under
    /// the requested algorithm (the identifier is rewritten on the next
    /// persist).
    pub fn open(
        path: impl Into<PathBuf>,
        allowlist: AllowlistPolicy,
        algorithm: Algorithm,
        exploration: Exploration,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let q_table = match std::fs::read_to_string(&path) {
            Ok(raw) if !raw.trim().is_empty() => {
                let snapshot: Snapshot = serde_json::from_str(&raw)?;
                let mut table = snapshot.q_table;
                table.fill_missing();
                debug!(path = %path.display(), algorithm = %snapshot.algorithm, "loaded value table");
                table
            }
            Ok(_) => QTable::zeroed(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => QTable::zeroed(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            inner: Mutex::new(StoreInner {
                q_table,
                experiences: VecDeque::new(),
                exploration,
            }),
            allowlist,
            algorithm,
            path: Some(path),
        })
    }

    pub fn allowlist(&self) -> &AllowlistPolicy {
        &self.allowlist
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // Lock poisoning only happens if a holder panicked; the table itself
        // is still consistent because each update writes one cell.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn q_value(&self, state: StateId, action: ActionId) -> f64 {
        self.lock().q_table.get(state, action)
    }

    pub fn best_action(&self, state: StateId) -> (ActionId, f64) {
        self.lock().q_table.best_action(state)
    }

    /// Snapshot of one state's row, in declared action order.
    pub fn state_row(&self, state: StateId) -> Vec<(ActionId, f64)> {
        self.lock().q_table.row(state)
    }

    pub fn exploration(&self) -> Exploration {
        self.lock().exploration
    }

    pub fn experience_count(&self) -> usize {
        self.lock().experiences.len()
    }

    /// Clone of the full table, for display and snapshotting.
    pub fn table(&self) -> QTable {
        self.lock().q_table.clone()
    }

    /// Persist the current table atomically next to the configured path.
    ///
    /// No-op for stores opened without a path.
    pub fn persist(&self) -> Result<(), StoreError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            algorithm: self.algorithm,
            q_table: self.table(),
        };
        let body = serde_json::to_string_pretty(&snapshot)?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(body.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path)?;

        info!(path = %path.display(), "value table persisted");
        Ok(())
    }
}
