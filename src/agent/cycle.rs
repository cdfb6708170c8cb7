//! One evolution cycle: load state, fetch metrics, evaluate, gate, execute,
//! persist.
//!
//! State is written once, after the action loop, and only for live cycles.
//! An error before the first action runs leaves the previous state file
//! authoritative. Once actions have run, journal failures are logged and the
//! cycle still persists their effects.

use crate::config::Thresholds;
use crate::evolution::{apply_effect, evaluate, is_action_safe, SafetyVerdict};
use crate::executor::ActionExecutor;
use crate::metrics::MetricsProvider;
use crate::state::{CycleTally, Journal, StateStore};
use crate::types::{ActionOutcome, AgentState, EvolutionAction, MetricsSnapshot};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What happened to one action in a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleEntry {
    pub action: EvolutionAction,
    pub outcome: ActionOutcome,
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub metrics: MetricsSnapshot,
    pub entries: Vec<CycleEntry>,
    pub tally: CycleTally,
    /// State after the cycle (unchanged for dry runs).
    pub state: AgentState,
    pub persisted: bool,
}

impl CycleReport {
    pub fn actions(&self) -> impl Iterator<Item = &EvolutionAction> {
        self.entries.iter().map(|e| &e.action)
    }
}

/// Runs evolution cycles against a state store, a metrics source and an
/// executor. Callers must not run two cycles against the same store at once.
pub struct CycleRunner {
    thresholds: Thresholds,
    store: StateStore,
    journal: Arc<Mutex<Journal>>,
    provider: Arc<dyn MetricsProvider>,
    executor: Arc<dyn ActionExecutor>,
}

impl CycleRunner {
    pub fn new(
        thresholds: Thresholds,
        store: StateStore,
        journal: Arc<Mutex<Journal>>,
        provider: Arc<dyn MetricsProvider>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            thresholds,
            store,
            journal,
            provider,
            executor,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run one cycle to completion.
    pub async fn run_cycle(&self, dry_run: bool) -> Result<CycleReport> {
        let started_at = Utc::now();
        info!(dry_run, "Evolution cycle starting");

        let mut state = self.store.load().context("Failed to load agent state")?;
        let metrics = self
            .provider
            .fetch()
            .await
            .with_context(|| format!("Failed to fetch metrics from {}", self.provider.name()))?;

        let actions = evaluate(&metrics, &state, &self.thresholds, started_at)
            .context("Evaluation rejected its inputs")?;
        debug!(count = actions.len(), "Actions proposed");

        let cycle_id = {
            let journal = self.journal.lock().await;
            if !dry_run {
                journal.record_metrics(&metrics, started_at)?;
            }
            journal.begin_cycle(started_at, dry_run, &metrics)?
        };

        let mut entries = Vec::with_capacity(actions.len());
        let mut tally = CycleTally::default();

        for action in actions {
            let (outcome, detail) =
                match is_action_safe(&action, &metrics, &self.thresholds) {
                    SafetyVerdict::Blocked(reason) => {
                        warn!(action = %action, %reason, "Action rejected by safety gate");
                        tally.rejected += 1;
                        (ActionOutcome::Rejected, Some(reason.to_string()))
                    }
                    SafetyVerdict::Safe if dry_run => {
                        info!(action = %action, priority = action.priority(), "Dry run, not executing");
                        (ActionOutcome::DryRun, None)
                    }
                    SafetyVerdict::Safe => match self.executor.execute(&action, &metrics).await {
                        Ok(()) => {
                            apply_effect(&mut state, &action, Utc::now());
                            info!(action = %action, priority = action.priority(), "Action executed");
                            tally.executed += 1;
                            (ActionOutcome::Executed, None)
                        }
                        Err(e) => {
                            warn!(action = %action, "Action failed: {e:#}");
                            tally.failed += 1;
                            (ActionOutcome::Failed, Some(format!("{e:#}")))
                        }
                    },
                };

            // Effects may already have happened; a journal error must not
            // stop them from being persisted below.
            {
                let journal = self.journal.lock().await;
                if let Err(e) =
                    journal.log_action(&cycle_id, &action, outcome, detail.as_deref(), Utc::now())
                {
                    warn!(action = %action, %outcome, "Failed to journal action: {e:#}");
                }
            }
            entries.push(CycleEntry {
                action,
                outcome,
                detail,
            });
        }

        let persisted = if dry_run {
            false
        } else {
            self.store.save(&state).context("Failed to persist agent state")?;
            true
        };

        let finished_at = Utc::now();
        {
            let journal = self.journal.lock().await;
            if let Err(e) = journal.finish_cycle(&cycle_id, finished_at, tally, persisted) {
                warn!(cycle = %cycle_id, "Failed to journal cycle totals: {e:#}");
            }
        }

        info!(
            cycle = %cycle_id,
            executed = tally.executed,
            rejected = tally.rejected,
            failed = tally.failed,
            mode = %state.mode(),
            "Evolution cycle finished"
        );

        Ok(CycleReport {
            cycle_id,
            started_at,
            finished_at,
            dry_run,
            metrics,
            entries,
            tally,
            state,
            persisted,
        })
    }
}
