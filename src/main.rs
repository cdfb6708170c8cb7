//! LobsterForge: autonomous colony treasury agent.
//!
//! Usage:
//!   lobsterforge init                 Write a default config
//!   lobsterforge cycle [--dry-run]    Run one evolution cycle
//!   lobsterforge run                  Run cycles on the cron schedule
//!   lobsterforge status               Show mode, health and pending work
//!   lobsterforge evaluate --metrics <file> [--state <file>]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lobsterforge::agent::{CycleReport, CycleRunner};
use lobsterforge::config::{self, AgentConfig};
use lobsterforge::evolution::{evaluate, is_action_safe, SafetyVerdict};
use lobsterforge::executor::{post_text, LiveExecutor};
use lobsterforge::metrics::{
    check_health, metrics_report, ChainMetricsProvider, FileMetricsProvider, MetricsProvider,
    TreasuryStatus,
};
use lobsterforge::scheduler::CycleDaemon;
use lobsterforge::social::SocialClient;
use lobsterforge::state::{Journal, StateStore};
use lobsterforge::types::*;

const CONFIG_FILE: &str = "lobsterforge.toml";

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "lobsterforge")]
#[command(version)]
#[command(about = "Autonomous treasury agent for the LobsterForge colony")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the agent home directory (default ~/.lobsterforge).
    #[arg(long)]
    home: Option<String>,

    /// Log level (debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config into the home directory.
    Init {
        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },

    /// Run one evolution cycle.
    Cycle {
        /// Evaluate and log without executing or persisting.
        #[arg(long)]
        dry_run: bool,

        /// Read metrics from a JSON file instead of the chain.
        #[arg(long)]
        metrics: Option<PathBuf>,
    },

    /// Run cycles on the configured cron schedule until Ctrl+C.
    Run,

    /// Show operating mode, treasury health and pending work.
    Status,

    /// Evaluate a metrics file offline and print the verdicts.
    Evaluate {
        #[arg(long)]
        metrics: PathBuf,

        /// State file to evaluate against (default: the configured state).
        #[arg(long)]
        state: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let home_dir = match &cli.home {
        Some(home) => PathBuf::from(shellexpand::tilde(home).into_owned()),
        None => config::default_home_dir(),
    };

    match cli.command {
        Commands::Init { force } => cmd_init(&home_dir, force),
        Commands::Cycle { dry_run, metrics } => cmd_cycle(&home_dir, dry_run, metrics).await,
        Commands::Run => cmd_run(&home_dir).await,
        Commands::Status => cmd_status(&home_dir).await,
        Commands::Evaluate { metrics, state } => cmd_evaluate(&home_dir, &metrics, state).await,
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_init(home_dir: &Path, force: bool) -> Result<()> {
    let config_path = home_dir.join(CONFIG_FILE);
    if config_path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            "!".yellow().bold(),
            config_path.display()
        );
        return Ok(());
    }

    let cfg = AgentConfig {
        state_path: home_dir.join("state.json").display().to_string(),
        journal_path: home_dir.join("journal.db").display().to_string(),
        ..AgentConfig::default()
    };
    config::save_config(&cfg, &config_path)?;

    println!("{} Wrote {}", ">>>".green().bold(), config_path.display());
    println!("    Set treasury_address and [contracts] before running live cycles.");
    Ok(())
}

async fn cmd_cycle(home_dir: &Path, dry_run: bool, metrics: Option<PathBuf>) -> Result<()> {
    let (cfg, store, journal) = bootstrap(home_dir)?;
    let journal = Arc::new(Mutex::new(journal));

    let provider: Arc<dyn MetricsProvider> = match metrics {
        Some(path) => Arc::new(FileMetricsProvider::new(path)),
        None => Arc::new(ChainMetricsProvider::from_config(&cfg)),
    };
    let runner = build_runner(&cfg, store, journal, provider);

    let report = runner.run_cycle(dry_run).await?;
    print_report(&report);
    Ok(())
}

async fn cmd_run(home_dir: &Path) -> Result<()> {
    let (cfg, store, journal) = bootstrap(home_dir)?;
    let journal = Arc::new(Mutex::new(journal));
    let provider: Arc<dyn MetricsProvider> = Arc::new(ChainMetricsProvider::from_config(&cfg));
    let runner = Arc::new(build_runner(&cfg, store, journal, provider));

    let mut daemon = CycleDaemon::new(runner, &cfg.cycle_schedule)?;

    println!(
        "{} Starting '{}' (schedule: {}, treasury: {})",
        ">>>".green().bold(),
        cfg.name,
        cfg.cycle_schedule,
        if cfg.treasury_address.is_empty() {
            "unset"
        } else {
            cfg.treasury_address.as_str()
        },
    );

    let cancel = CancellationToken::new();
    let daemon_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = daemon.run(daemon_cancel).await {
            error!("Cycle daemon error: {}", e);
        }
        daemon.completed()
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!("\n{} Shutting down gracefully...", "<<<".red().bold());
    cancel.cancel();

    // A cycle in flight is allowed to finish; give it a generous bound.
    let shutdown_timeout = tokio::time::Duration::from_secs(120);
    match tokio::time::timeout(shutdown_timeout, handle).await {
        Ok(Ok(completed)) => info!(completed, "Daemon shutdown complete"),
        Ok(Err(e)) => warn!("Daemon task join error: {}", e),
        Err(_) => warn!("Timed out waiting for the running cycle"),
    }
    Ok(())
}

async fn cmd_status(home_dir: &Path) -> Result<()> {
    let (cfg, store, journal) = bootstrap(home_dir)?;
    let state = store.load()?;
    let now = chrono::Utc::now();

    let latest = journal.latest_metrics()?;
    let change = journal.metrics_change(now, 24)?;
    let pending = journal.pending_work_orders()?;
    let cycles = journal.cycle_count()?;
    let last_cycle = journal
        .kv_get("last_cycle_at")?
        .unwrap_or_else(|| "never".into());
    let quorum = state
        .pending_proposals
        .iter()
        .filter(|p| p.votes >= cfg.thresholds.proposal_min_votes)
        .count();

    println!();
    println!("{}", "=== LobsterForge Status ===".bold());
    println!();
    println!("  {}:  {}", "Name".bold(), cfg.name);
    println!("  {}:  {}", "Mode".bold(), colorize_mode(state.mode()));
    println!();
    println!("  {}:", "State".bold());
    let deployed: Vec<&str> = state.deployed_contracts.iter().map(String::as_str).collect();
    println!(
        "    Deployed:   {}",
        if deployed.is_empty() {
            "none".to_string()
        } else {
            deployed.join(", ")
        }
    );
    println!("    Last molt:  {} holders", state.last_molt_holder_count);
    println!("    Last post:  {}", state.last_post_time.to_rfc3339());
    println!(
        "    Proposals:  {} pending, {} at quorum ({} votes)",
        state.pending_proposals.len(),
        quorum,
        cfg.thresholds.proposal_min_votes
    );
    println!();
    println!("  {}:", "Runtime".bold());
    println!("    Cycles:     {}", cycles);
    println!("    Last cycle: {}", last_cycle);
    println!("    Work queue: {} pending", pending.len());
    for order in &pending {
        println!("      {} {}", order.id.dimmed(), order.action);
    }
    println!();

    match latest {
        Some((metrics, taken_at)) => {
            let health = check_health(&metrics, &cfg.thresholds);
            println!(
                "  {}: {} (as of {})",
                "Health".bold(),
                colorize_status(health.status),
                taken_at.to_rfc3339()
            );
            println!();
            for line in metrics_report(&metrics, &cfg.thresholds, change.as_ref()).lines() {
                println!("  {}", line);
            }
        }
        None => println!("  {}: no metrics recorded yet", "Health".bold()),
    }
    println!();

    Ok(())
}

async fn cmd_evaluate(home_dir: &Path, metrics_path: &Path, state_path: Option<PathBuf>) -> Result<()> {
    let cfg = load_agent_config(home_dir)?;
    let metrics = FileMetricsProvider::new(metrics_path).fetch().await?;
    let store = match state_path {
        Some(path) => StateStore::new(path),
        None => StateStore::new(cfg.resolved_state_path()),
    };
    let state = store.load()?;

    let actions = evaluate(&metrics, &state, &cfg.thresholds, chrono::Utc::now())?;

    println!();
    println!(
        "{} {} action(s) for treasury {:.4} ETH, {} holders ({})",
        ">>>".green().bold(),
        actions.len(),
        metrics.treasury_eth,
        metrics.holder_count,
        colorize_mode(state.mode()),
    );
    println!();
    for action in &actions {
        let verdict = match is_action_safe(action, &metrics, &cfg.thresholds) {
            SafetyVerdict::Safe => "safe".green().to_string(),
            SafetyVerdict::Blocked(reason) => format!("{} ({})", "blocked".red(), reason),
        };
        println!("  [{:>3}] {}  {}", action.priority(), action.to_string().bold(), verdict);

        if let Some(text) = post_text(action, &metrics) {
            for line in text.lines() {
                println!("        {}", line.dimmed());
            }
        }
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_agent_config(home_dir: &Path) -> Result<AgentConfig> {
    let config_path = home_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        warn!(
            "No config at {}, using defaults (run `lobsterforge init`)",
            config_path.display()
        );
    }
    config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

/// Bootstrap the runtime: load config, state store and journal.
fn bootstrap(home_dir: &Path) -> Result<(AgentConfig, StateStore, Journal)> {
    if !home_dir.exists() {
        std::fs::create_dir_all(home_dir).with_context(|| {
            format!("Failed to create home directory: {}", home_dir.display())
        })?;
    }

    let cfg = load_agent_config(home_dir)?;
    cfg.thresholds
        .validate()
        .context("Invalid [thresholds] in config")?;

    let store = StateStore::new(cfg.resolved_state_path());

    let journal_path = cfg.resolved_journal_path();
    let journal_path = Path::new(&journal_path);
    let journal = Journal::open(journal_path)
        .with_context(|| format!("Failed to open journal at {}", journal_path.display()))?;

    Ok((cfg, store, journal))
}

fn build_runner(
    cfg: &AgentConfig,
    store: StateStore,
    journal: Arc<Mutex<Journal>>,
    provider: Arc<dyn MetricsProvider>,
) -> CycleRunner {
    let social = if cfg.social.relay_url.is_empty() {
        None
    } else {
        Some(SocialClient::new(&cfg.social.relay_url, &cfg.social.handle))
    };
    let executor = Arc::new(LiveExecutor::new(social, journal.clone()));
    CycleRunner::new(cfg.thresholds.clone(), store, journal, provider, executor)
}

fn print_report(report: &CycleReport) {
    println!();
    println!(
        "{} Cycle {}{}",
        ">>>".green().bold(),
        report.cycle_id,
        if report.dry_run { " (dry run)" } else { "" }
    );
    for entry in &report.entries {
        let outcome = match entry.outcome {
            ActionOutcome::Executed => "executed".green().to_string(),
            ActionOutcome::DryRun => "dry run".cyan().to_string(),
            ActionOutcome::Rejected => "rejected".yellow().to_string(),
            ActionOutcome::Failed => "failed".red().to_string(),
        };
        match &entry.detail {
            Some(detail) => println!("  {:<32} {}  {}", entry.action.to_string(), outcome, detail.dimmed()),
            None => println!("  {:<32} {}", entry.action.to_string(), outcome),
        }
    }
    println!(
        "  Mode: {}  Persisted: {}",
        colorize_mode(report.state.mode()),
        report.persisted
    );
    println!();
}

fn colorize_mode(mode: OperatingMode) -> String {
    match mode {
        OperatingMode::Operational => mode.to_string().green().to_string(),
        OperatingMode::Conservation => mode.to_string().yellow().to_string(),
        OperatingMode::Survival => mode.to_string().red().bold().to_string(),
    }
}

fn colorize_status(status: TreasuryStatus) -> String {
    match status {
        TreasuryStatus::Healthy => status.to_string().green().to_string(),
        TreasuryStatus::Conservation => status.to_string().yellow().to_string(),
        TreasuryStatus::Survival => status.to_string().red().bold().to_string(),
    }
}
