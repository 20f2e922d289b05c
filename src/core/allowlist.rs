//! Per-environment action allowlists.
//!
//! The allowlist is the one gate every candidate action must pass before
//! execution, no matter which strategy proposed it. It is fixed for the
//! lifetime of the process.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{ActionId, Environment};

/// Environment-scoped set of permitted actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowlistPolicy {
    allowed: BTreeMap<Environment, BTreeSet<ActionId>>,
}

impl Default for AllowlistPolicy {
    /// Production permits only the conservative pair; lower environments
    /// widen progressively.
    fn default() -> Self {
        let mut allowed = BTreeMap::new();
        allowed.insert(
            Environment::Dev,
            BTreeSet::from(ActionId::ALL),
        );
        allowed.insert(
            Environment::Stage,
            BTreeSet::from([
                ActionId::Noop,
                ActionId::Restart,
                ActionId::ScaleUp,
                ActionId::ScaleDown,
            ]),
        );
        allowed.insert(
            Environment::Prod,
            BTreeSet::from([ActionId::Noop, ActionId::Restart]),
        );
        Self { allowed }
    }
}

impl AllowlistPolicy {
    /// Build from explicit per-environment sets. Environments absent from
    /// the map permit nothing.
    pub fn new(allowed: BTreeMap<Environment, BTreeSet<ActionId>>) -> Self {
        Self { allowed }
    }

    pub fn is_allowed(&self, env: Environment, action: ActionId) -> bool {
        self.allowed
            .get(&env)
            .map(|set| set.contains(&action))
            .unwrap_or(false)
    }

    /// The allowed set for an environment, in declared action order.
    pub fn allowed_for(&self, env: Environment) -> Vec<ActionId> {
        match self.allowed.get(&env) {
            Some(set) => ActionId::ALL
                .into_iter()
                .filter(|a| set.contains(a))
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prod_is_conservative() {
        let policy = AllowlistPolicy::default();

        assert!(policy.is_allowed(Environment::Prod, ActionId::Restart));
        assert!(policy.is_allowed(Environment::Prod, ActionId::Noop));
        assert!(!policy.is_allowed(Environment::Prod, ActionId::ScaleUp));
        assert!(!policy.is_allowed(Environment::Prod, ActionId::Deploy));
        assert!(!policy.is_allowed(Environment::Prod, ActionId::Rollback));
    }

    #[test]
    fn test_default_dev_permits_everything() {
        let policy = AllowlistPolicy::default();
        for action in ActionId::ALL {
            assert!(policy.is_allowed(Environment::Dev, action));
        }
    }

    #[test]
    fn test_allowed_for_reports_declared_order() {
        let policy = AllowlistPolicy::default();
        assert_eq!(
            policy.allowed_for(Environment::Prod),
            vec![ActionId::Noop, ActionId::Restart]
        );
        assert_eq!(
            policy.allowed_for(Environment::Stage),
            vec![
                ActionId::Noop,
                ActionId::Restart,
                ActionId::ScaleUp,
                ActionId::ScaleDown
            ]
        );
    }

    #[test]
    fn test_unlisted_environment_permits_nothing() {
        let policy = AllowlistPolicy::new(BTreeMap::new());
        assert!(!policy.is_allowed(Environment::Dev, ActionId::Noop));
        assert!(policy.allowed_for(Environment::Prod).is_empty());
    }
}
