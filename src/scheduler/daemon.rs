//! Cron-driven cycle daemon.
//!
//! Runs one cycle immediately, then one per cron tick. Cycles run inline in
//! the daemon task, so two cycles never overlap. Cancellation is checked only
//! between cycles; a running cycle always completes.

use crate::agent::CycleRunner;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Parse a 6-field cron expression (seconds first).
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    Schedule::from_str(expr).with_context(|| format!("Invalid cron schedule '{}'", expr))
}

/// Background cycle daemon.
pub struct CycleDaemon {
    runner: Arc<CycleRunner>,
    schedule: Schedule,
    completed: u64,
}

impl CycleDaemon {
    pub fn new(runner: Arc<CycleRunner>, cron_expr: &str) -> Result<Self> {
        let schedule = parse_schedule(cron_expr)?;
        Ok(Self {
            runner,
            schedule,
            completed: 0,
        })
    }

    /// Number of cycles that finished successfully.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Next tick strictly after `after`.
    pub fn next_run(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Run until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!("Cycle daemon started");
        self.run_once().await;

        loop {
            let now = Utc::now();
            let Some(next) = self.next_run(now) else {
                info!("Cron schedule has no further runs, stopping");
                return Ok(());
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next = %next.to_rfc3339(), "Next cycle scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.run_once().await;
                }
                _ = cancel.cancelled() => {
                    info!("Cycle daemon shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// A failed cycle is logged; the previous state stands.
    async fn run_once(&mut self) {
        match self.runner.run_cycle(false).await {
            Ok(_) => self.completed += 1,
            Err(e) => error!("Evolution cycle failed: {e:#}"),
        }
    }
}
