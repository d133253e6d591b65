//! Tagwatch - container image tag tracker.
//!
//! Usage:
//!     tagwatch run --config ./tagwatch.toml
//!     tagwatch state --json
//!     tagwatch config

mod config;
mod cycle;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use config::{load_config, Config};
use tagwatch_logging::{init_logging, LogConfig};
use tagwatch_messaging::ZmqPublisher;
use tagwatch_protocol::paths;

#[derive(Parser, Debug)]
#[command(name = "tagwatch", about = "Track container image tags and publish changes")]
struct Cli {
    /// Verbose console output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one tracking cycle: inspect, reconcile, publish, persist
    Run {
        /// Path to the config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to the state file (overrides the config)
        #[arg(long)]
        state: Option<PathBuf>,

        /// Print detected changes without publishing or persisting
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the persisted tag state
    State {
        /// Path to the config file (used to locate the state file)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to the state file (overrides the config)
        #[arg(long)]
        state: Option<PathBuf>,

        /// Emit raw JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved configuration
    Config {
        /// Path to the config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
}

fn load_config_or_default(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(paths::default_config_path);
    load_config(&path)
}

async fn cmd_run(
    config_path: Option<PathBuf>,
    state_override: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let config = load_config_or_default(config_path)?;
    let state_path = state_override.unwrap_or_else(|| config.state_path());
    info!(
        repos = config.repositories.len(),
        state = %state_path.display(),
        dry_run,
        "starting tracking cycle"
    );

    let report = if dry_run {
        cycle::run_cycle(&config, &state_path, None).await?
    } else {
        let mut publisher = ZmqPublisher::connect(&config.broker.endpoint)
            .await
            .with_context(|| {
                format!("failed to connect to broker at {}", config.broker.endpoint)
            })?;
        cycle::run_cycle(&config, &state_path, Some(&mut publisher)).await?
    };

    if !report.unreachable.is_empty() {
        println!("unreachable repositories:");
        for repo in &report.unreachable {
            println!("  {repo}");
        }
    }
    println!(
        "{} repositories checked, {} notifications sent",
        report.repos_checked, report.messages_sent
    );
    Ok(())
}

/// Locate the state file: explicit override first, then the config's
/// state_path, then the per-user default when no config file exists.
fn resolve_state_path(
    config_path: Option<PathBuf>,
    state_override: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = state_override {
        return Ok(path);
    }
    match config_path {
        Some(path) => Ok(load_config(&path)?.state_path()),
        None => {
            let default = paths::default_config_path();
            if default.exists() {
                Ok(load_config(&default)?.state_path())
            } else {
                Ok(paths::default_state_path())
            }
        }
    }
}

fn cmd_state(config_path: Option<PathBuf>, state_path: Option<PathBuf>, json: bool) -> Result<()> {
    let path = resolve_state_path(config_path, state_path)?;
    let state = tagwatch_state::load(&path)
        .with_context(|| format!("failed to load state from {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    if state.is_empty() {
        println!("no persisted state at {}", path.display());
        return Ok(());
    }
    for (repo, repo_state) in &state {
        let marker = if repo_state.ignore { " (carried over)" } else { "" };
        println!("{repo}{marker}: {} tags", repo_state.tags.len());
        for (tag, record) in &repo_state.tags {
            let digest = record.digest.as_deref().unwrap_or("-");
            println!("  {tag}  {}  {digest}", record.action);
        }
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let path = config_path.unwrap_or_else(paths::default_config_path);
    let config = load_config(&path)?;

    if json {
        let repos: Vec<_> = config
            .repositories
            .iter()
            .map(|r| {
                serde_json::json!({
                    "repo": r.repo,
                    "token_env": r.token_env,
                })
            })
            .collect();
        let view = serde_json::json!({
            "state_path": config.state_path().display().to_string(),
            "fetch_concurrency": config.fetch_concurrency,
            "broker": {
                "endpoint": config.broker.endpoint,
                "topic_prefix": config.broker.topic_prefix,
            },
            "repositories": repos,
        });
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("config:     {}", path.display());
    println!("state:      {}", config.state_path().display());
    println!("broker:     {}", config.broker.endpoint);
    println!("prefix:     {}", config.broker.topic_prefix);
    println!("repositories ({}):", config.repositories.len());
    for repo in &config.repositories {
        match &repo.token_env {
            Some(var) => println!("  {}  (token from ${var})", repo.repo),
            None => println!("  {}  (anonymous)", repo.repo),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = init_logging(LogConfig {
        app_name: "tagwatch",
        verbose: cli.verbose,
    })?;

    match cli.command {
        Commands::Run {
            config,
            state,
            dry_run,
        } => cmd_run(config, state, dry_run).await,
        Commands::State { config, state, json } => cmd_state(config, state, json),
        Commands::Config { config, json } => cmd_config(config, json),
    }
}
