//! Command-line interface for remedian.
//!
//! Provides one-shot commands for running the pipeline on a single event,
//! exercising the decision and execution stages individually, and
//! inspecting the learned value table.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{
    DecisionService, ExecutionService, HttpDecisionService, HttpExecutionService, LogOnlyInfra,
};
use crate::config::Config;
use crate::core::{EventOrchestrator, ExecutionGateway};
use crate::domain::{EventPayload, ExecutionRequest};
use crate::policy::{
    DecisionEngine, DecisionStrategy, Exploration, Learner, PolicyMode, PolicyStore, RlPolicy,
    RulePolicy, StateId,
};

/// remedian - runtime remediation pipeline
#[derive(Parser, Debug)]
#[command(name = "remedian")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process one runtime event (JSON on stdin) through the full pipeline
    Emit,

    /// Run only the decision stage on an event (JSON on stdin)
    Decide,

    /// Run only the execution stage on a request (JSON on stdin)
    Execute,

    /// Show the learned value table
    Qtable,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = Config::load()?;

        match self.command {
            Commands::Emit => emit_event(&config).await,
            Commands::Decide => decide_once(&config).await,
            Commands::Execute => execute_once(&config).await,
            Commands::Qtable => show_qtable(&config),
            Commands::Config => show_config(&config),
        }
    }
}

/// Build the shared policy store from configuration.
fn open_store(config: &Config) -> Result<Arc<PolicyStore>> {
    let exploration = if config.train_mode {
        Exploration::training()
    } else {
        Exploration::serving()
    };

    let store = PolicyStore::open(
        &config.q_table_path,
        config.allowlist.clone(),
        config.algorithm,
        exploration,
    )
    .with_context(|| {
        format!(
            "Failed to open value table: {}",
            config.q_table_path.display()
        )
    })?;

    Ok(Arc::new(store))
}

fn build_decision_service(
    config: &Config,
    store: &Arc<PolicyStore>,
) -> Arc<dyn DecisionService> {
    if let Some(ref url) = config.decision_url {
        return Arc::new(HttpDecisionService::new(url.clone()));
    }

    let strategy = match config.mode {
        PolicyMode::Rules => DecisionStrategy::Rules(RulePolicy::new()),
        PolicyMode::Learned => DecisionStrategy::Learned(RlPolicy::new(Arc::clone(store))),
    };
    Arc::new(DecisionEngine::new(strategy))
}

fn build_execution_service(
    config: &Config,
    store: &Arc<PolicyStore>,
) -> Arc<dyn ExecutionService> {
    if let Some(ref url) = config.execution_url {
        return Arc::new(HttpExecutionService::new(url.clone()));
    }
    Arc::new(ExecutionGateway::new(
        Arc::clone(store),
        Arc::new(LogOnlyInfra),
        config.simulate,
    ))
}

fn read_stdin_json<T: serde::de::DeserializeOwned>() -> Result<T> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read stdin")?;
    serde_json::from_str(&buffer).context("Failed to parse JSON from stdin")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Full pipeline for one event.
async fn emit_event(config: &Config) -> Result<()> {
    let event: EventPayload = read_stdin_json()?;

    let store = open_store(config)?;
    let decision = build_decision_service(config, &store);
    let execution = build_execution_service(config, &store);

    let mut orchestrator = EventOrchestrator::new(decision, execution)
        .with_timeouts(config.decision_timeout, config.execution_timeout);

    if config.mode == PolicyMode::Learned {
        let learner = Learner::new(Arc::clone(&store))
            .with_hyperparameters(config.alpha, config.gamma);
        orchestrator = orchestrator.with_learner(Arc::new(learner));
    }

    let outcome = orchestrator.process_event(&event).await;
    print_json(&outcome)?;

    // Checkpoint the table after a learned-mode run.
    if config.mode == PolicyMode::Learned {
        store.persist()?;
    }

    Ok(())
}

/// Decision stage only.
async fn decide_once(config: &Config) -> Result<()> {
    let event: EventPayload = read_stdin_json()?;

    let store = open_store(config)?;
    let service = build_decision_service(config, &store);
    let decision = service
        .decide(&event)
        .await
        .map_err(|kind| anyhow::anyhow!("decision service unavailable: {kind}"))?;

    print_json(&decision)
}

/// Execution stage only.
async fn execute_once(config: &Config) -> Result<()> {
    let request: ExecutionRequest = read_stdin_json()?;

    let store = open_store(config)?;
    let service = build_execution_service(config, &store);
    let result = service
        .execute(&request)
        .await
        .map_err(|kind| anyhow::anyhow!("execution service unavailable: {kind}"))?;

    print_json(&result)
}

/// Print the learned value table, one state per block.
fn show_qtable(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let table = store.table();

    println!("algorithm: {}", store.algorithm());
    for state in StateId::ALL {
        println!("{state}:");
        for (action, value) in table.row(state) {
            println!("  {:<12} {value:>8.3}", action.as_str());
        }
        let (best, value) = table.best_action(state);
        println!("  best: {best} (Q={value:.3})");
    }

    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("home: {}", config.home.display());
    println!("q_table: {}", config.q_table_path.display());
    println!(
        "config_file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("decision_timeout: {:?}", config.decision_timeout);
    println!("execution_timeout: {:?}", config.execution_timeout);
    println!("simulate: {}", config.simulate);
    println!(
        "mode: {}",
        match config.mode {
            PolicyMode::Rules => "rules",
            PolicyMode::Learned => "learned",
        }
    );
    println!("algorithm: {}", config.algorithm);
    println!("train_mode: {}", config.train_mode);
    println!(
        "decision_url: {}",
        config.decision_url.as_deref().unwrap_or("(in-process)")
    );
    println!(
        "execution_url: {}",
        config.execution_url.as_deref().unwrap_or("(in-process)")
    );
    Ok(())
}
