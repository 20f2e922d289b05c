//! Configuration for the remediation pipeline.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (REMEDIAN_HOME, REMEDIAN_SIMULATE, ...)
//! 2. Config file (.remedian/config.yaml)
//! 3. Defaults (~/.remedian, 3s timeouts, simulate on, rules mode)
//!
//! Config file discovery searches the current directory and parents for
//! .remedian/config.yaml. The resolved `Config` is constructed once and
//! injected into components; nothing reads configuration ambiently.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::allowlist::AllowlistPolicy;
use crate::domain::{ActionId, Environment};
use crate::policy::{Algorithm, PolicyMode};

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,
    #[serde(default)]
    pub policy: Option<PolicyConfig>,
    #[serde(default)]
    pub endpoints: Option<EndpointsConfig>,
    #[serde(default)]
    pub allowlist: Option<BTreeMap<Environment, BTreeSet<ActionId>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to config file)
    pub home: Option<String>,
    /// Value-table snapshot path (relative to home)
    pub q_table: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub decision_timeout_seconds: Option<u64>,
    pub execution_timeout_seconds: Option<u64>,
    pub simulate: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// "rules" or "learned"
    pub mode: Option<String>,
    /// "q_learning", "double_dqn", or "actor_critic"
    pub algorithm: Option<String>,
    pub train_mode: Option<bool>,
    pub alpha: Option<f64>,
    pub gamma: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsConfig {
    /// Remote decision service base URL; in-process engine when unset.
    pub decision_url: Option<String>,
    /// Remote execution service base URL; in-process gateway when unset.
    pub execution_url: Option<String>,
}

/// Resolved configuration, injected into every component at construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub home: PathBuf,
    pub q_table_path: PathBuf,
    pub decision_timeout: Duration,
    pub execution_timeout: Duration,
    pub simulate: bool,
    pub mode: PolicyMode,
    pub algorithm: Algorithm,
    pub train_mode: bool,
    pub alpha: f64,
    pub gamma: f64,
    pub decision_url: Option<String>,
    pub execution_url: Option<String>,
    pub allowlist: AllowlistPolicy,
    /// Path to the config file, if one was found.
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".remedian");
        Self {
            q_table_path: home.join("q_table.json"),
            home,
            decision_timeout: Duration::from_secs(3),
            execution_timeout: Duration::from_secs(3),
            simulate: true,
            mode: PolicyMode::Rules,
            algorithm: Algorithm::QLearning,
            train_mode: false,
            alpha: crate::policy::learner::DEFAULT_ALPHA,
            gamma: crate::policy::learner::DEFAULT_GAMMA,
            decision_url: None,
            execution_url: None,
            allowlist: AllowlistPolicy::default(),
            config_file: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self> {
        let config_file = find_config_file();
        let file = match config_file {
            Some(ref path) => Some(load_config_file(path)?),
            None => None,
        };
        Self::resolve(file, config_file)
    }

    fn resolve(file: Option<ConfigFile>, config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.config_file = config_path.clone();

        if let Some(file) = file {
            let base_dir = config_path
                .as_deref()
                .and_then(Path::parent) // .remedian/
                .unwrap_or(Path::new("."));

            if let Some(ref home) = file.paths.home {
                config.home = resolve_path(base_dir, home);
            }
            config.q_table_path = match file.paths.q_table {
                Some(ref rel) => config.home.join(rel),
                None => config.home.join("q_table.json"),
            };

            if let Some(pipeline) = file.pipeline {
                if let Some(secs) = pipeline.decision_timeout_seconds {
                    config.decision_timeout = Duration::from_secs(secs);
                }
                if let Some(secs) = pipeline.execution_timeout_seconds {
                    config.execution_timeout = Duration::from_secs(secs);
                }
                if let Some(simulate) = pipeline.simulate {
                    config.simulate = simulate;
                }
            }

            if let Some(policy) = file.policy {
                if let Some(ref mode) = policy.mode {
                    config.mode = mode
                        .parse()
                        .map_err(|_| anyhow::anyhow!("invalid policy mode: {mode:?}"))?;
                }
                if let Some(ref algorithm) = policy.algorithm {
                    config.algorithm = algorithm
                        .parse()
                        .map_err(|_| anyhow::anyhow!("invalid algorithm: {algorithm:?}"))?;
                }
                if let Some(train) = policy.train_mode {
                    config.train_mode = train;
                }
                if let Some(alpha) = policy.alpha {
                    config.alpha = alpha;
                }
                if let Some(gamma) = policy.gamma {
                    config.gamma = gamma;
                }
            }

            if let Some(endpoints) = file.endpoints {
                config.decision_url = endpoints.decision_url;
                config.execution_url = endpoints.execution_url;
            }

            if let Some(allowlist) = file.allowlist {
                config.allowlist = AllowlistPolicy::new(allowlist);
            }
        } else {
            config.q_table_path = config.home.join("q_table.json");
        }

        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(home) = std::env::var("REMEDIAN_HOME") {
            self.home = PathBuf::from(&home);
            self.q_table_path = self.home.join("q_table.json");
        }
        if let Some(secs) = env_u64("REMEDIAN_DECISION_TIMEOUT_SECS")? {
            self.decision_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("REMEDIAN_EXECUTION_TIMEOUT_SECS")? {
            self.execution_timeout = Duration::from_secs(secs);
        }
        if let Some(flag) = env_bool("REMEDIAN_SIMULATE")? {
            self.simulate = flag;
        }
        if let Some(flag) = env_bool("REMEDIAN_TRAIN_MODE")? {
            self.train_mode = flag;
        }
        if let Ok(mode) = std::env::var("REMEDIAN_POLICY_MODE") {
            self.mode = mode
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid REMEDIAN_POLICY_MODE: {mode:?}"))?;
        }
        if let Ok(algorithm) = std::env::var("REMEDIAN_ALGORITHM") {
            self.algorithm = algorithm
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid REMEDIAN_ALGORITHM: {algorithm:?}"))?;
        }
        if let Ok(url) = std::env::var("REMEDIAN_DECISION_URL") {
            self.decision_url = Some(url);
        }
        if let Ok(url) = std::env::var("REMEDIAN_EXECUTION_URL") {
            self.execution_url = Some(url);
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw
                .parse::<u64>()
                .with_context(|| format!("{name} must be an integer, got {raw:?}"))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => anyhow::bail!("{name} must be a boolean, got {raw:?}"),
        },
        Err(_) => Ok(None),
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".remedian").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::resolve(None, None).unwrap();

        assert_eq!(config.decision_timeout, Duration::from_secs(3));
        assert_eq!(config.execution_timeout, Duration::from_secs(3));
        assert!(config.simulate);
        assert_eq!(config.mode, PolicyMode::Rules);
        assert_eq!(config.algorithm, Algorithm::QLearning);
        assert!(config.decision_url.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let yaml = r#"
version: "1.0"
paths:
  home: ./state
  q_table: learned/q_table.json
pipeline:
  decision_timeout_seconds: 5
  execution_timeout_seconds: 2
  simulate: false
policy:
  mode: learned
  algorithm: double_dqn
  train_mode: true
endpoints:
  decision_url: http://localhost:8002
allowlist:
  prod: [restart, noop]
  stage: [restart, scale_up, noop]
"#;
        let file: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        let config = Config::resolve(Some(file), None).unwrap();

        assert_eq!(config.decision_timeout, Duration::from_secs(5));
        assert_eq!(config.execution_timeout, Duration::from_secs(2));
        assert!(!config.simulate);
        assert_eq!(config.mode, PolicyMode::Learned);
        assert_eq!(config.algorithm, Algorithm::DoubleDqn);
        assert!(config.train_mode);
        assert_eq!(
            config.decision_url.as_deref(),
            Some("http://localhost:8002")
        );
        assert!(config
            .q_table_path
            .ends_with("state/learned/q_table.json"));

        assert!(config.allowlist.is_allowed(Environment::Prod, ActionId::Restart));
        assert!(!config.allowlist.is_allowed(Environment::Prod, ActionId::ScaleUp));
        assert!(config.allowlist.is_allowed(Environment::Stage, ActionId::ScaleUp));
        // Environments absent from an explicit allowlist permit nothing.
        assert!(!config.allowlist.is_allowed(Environment::Dev, ActionId::Noop));
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let yaml = r#"
version: "1.0"
policy:
  mode: neural
"#;
        let file: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert!(Config::resolve(Some(file), None).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/srv/remedian");
        assert_eq!(
            resolve_path(&base, "./state"),
            PathBuf::from("/srv/remedian/./state")
        );
        assert_eq!(
            resolve_path(&base, "/var/lib/remedian"),
            PathBuf::from("/var/lib/remedian")
        );
    }
}
