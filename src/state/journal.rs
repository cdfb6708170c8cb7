//! SQLite cycle journal with WAL mode and schema versioning.
//!
//! Records every cycle, the fate of every proposed action, a metrics
//! history, and the work orders handed to the external deployer. The agent
//! state itself lives in the JSON [`StateStore`](crate::state::StateStore).

use crate::state::schema;
use crate::types::*;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::info;

/// The agent's cycle journal.
pub struct Journal {
    conn: Connection,
}

/// Fixed-width UTC timestamps so lexical order matches time order.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_outcome(outcome: String) -> rusqlite::Result<ActionOutcome> {
    serde_json::from_value(serde_json::Value::String(outcome))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

/// Totals written when a cycle finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleTally {
    pub executed: u32,
    pub rejected: u32,
    pub failed: u32,
}

impl Journal {
    /// Open (or create) the journal at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open journal database")?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let mut journal = Self { conn };
        journal.migrate()?;
        Ok(journal)
    }

    /// Open an in-memory journal (for testing and dry runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut journal = Self { conn };
        journal.migrate()?;
        Ok(journal)
    }

    fn migrate(&mut self) -> Result<()> {
        let version = self.schema_version();

        if version == 0 {
            info!("Creating journal schema v{}", schema::SCHEMA_VERSION);
            self.conn
                .execute_batch(schema::CREATE_SCHEMA)
                .context("Failed to create journal schema")?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::SCHEMA_VERSION],
            )?;
        } else if version > schema::SCHEMA_VERSION {
            bail!(
                "Journal schema v{} is newer than supported v{}",
                version,
                schema::SCHEMA_VERSION
            );
        }

        Ok(())
    }

    /// Current schema version (0 if uninitialized).
    fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Key-value store
    // -----------------------------------------------------------------------

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the KV store (upsert).
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cycles
    // -----------------------------------------------------------------------

    /// Open a cycle record and return its id.
    pub fn begin_cycle(
        &self,
        started_at: DateTime<Utc>,
        dry_run: bool,
        metrics: &MetricsSnapshot,
    ) -> Result<String> {
        let id = ulid::Ulid::new().to_string();
        self.conn.execute(
            "INSERT INTO cycles (id, started_at, dry_run, treasury_eth, holder_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                ts(started_at),
                dry_run as i32,
                metrics.treasury_eth,
                metrics.holder_count as i64,
            ],
        )?;
        Ok(id)
    }

    pub fn finish_cycle(
        &self,
        cycle_id: &str,
        finished_at: DateTime<Utc>,
        tally: CycleTally,
        persisted: bool,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE cycles SET finished_at = ?2, executed = ?3, rejected = ?4, failed = ?5, persisted = ?6
             WHERE id = ?1",
            params![
                cycle_id,
                ts(finished_at),
                tally.executed,
                tally.rejected,
                tally.failed,
                persisted as i32,
            ],
        )?;
        self.kv_set("last_cycle_at", &ts(finished_at))?;
        Ok(())
    }

    pub fn cycle_count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cycles", [], |row| row.get(0))?;
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Action log
    // -----------------------------------------------------------------------

    pub fn log_action(
        &self,
        cycle_id: &str,
        action: &EvolutionAction,
        outcome: ActionOutcome,
        detail: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let id = ulid::Ulid::new().to_string();
        let action_json = serde_json::to_string(action)?;
        self.conn.execute(
            "INSERT INTO action_log (id, cycle_id, action_type, action_json, priority, outcome, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                cycle_id,
                action.kind(),
                action_json,
                action.priority(),
                outcome.to_string(),
                detail,
                ts(at),
            ],
        )?;
        Ok(())
    }

    /// Action outcomes of one cycle, in the order they were recorded.
    pub fn cycle_actions(&self, cycle_id: &str) -> Result<Vec<ActionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT cycle_id, action_json, outcome, detail, created_at FROM action_log
             WHERE cycle_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![cycle_id], |row| {
            Ok(ActionRecord {
                cycle_id: row.get(0)?,
                action: parse_json(&row.get::<_, String>(1)?)?,
                outcome: parse_outcome(row.get(2)?)?,
                detail: row.get(3)?,
                created_at: parse_ts(&row.get::<_, String>(4)?)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    // -----------------------------------------------------------------------
    // Metrics history
    // -----------------------------------------------------------------------

    pub fn record_metrics(&self, metrics: &MetricsSnapshot, taken_at: DateTime<Utc>) -> Result<()> {
        let id = ulid::Ulid::new().to_string();
        let json = serde_json::to_string(metrics)?;
        self.conn.execute(
            "INSERT INTO metrics_snapshots (id, taken_at, metrics_json) VALUES (?1, ?2, ?3)",
            params![id, ts(taken_at), json],
        )?;
        Ok(())
    }

    /// Most recent journaled snapshot with the time it was taken.
    pub fn latest_metrics(&self) -> Result<Option<(MetricsSnapshot, DateTime<Utc>)>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT metrics_json, taken_at FROM metrics_snapshots
                 ORDER BY taken_at DESC, rowid DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((json, taken_at)) => Ok(Some((parse_json(&json)?, parse_ts(&taken_at)?))),
            None => Ok(None),
        }
    }

    /// Change between the oldest snapshot taken within the last `hours` and
    /// the latest one. `None` without at least two snapshots to compare.
    pub fn metrics_change(&self, now: DateTime<Utc>, hours: i64) -> Result<Option<MetricsChange>> {
        let cutoff = ts(now - Duration::hours(hours));

        let latest: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT id, metrics_json FROM metrics_snapshots ORDER BY taken_at DESC, rowid DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let oldest: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT id, metrics_json FROM metrics_snapshots WHERE taken_at >= ?1
                 ORDER BY taken_at ASC, rowid ASC LIMIT 1",
                params![cutoff],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match (oldest, latest) {
            (Some((old_id, old_json)), Some((new_id, new_json))) if old_id != new_id => {
                let old: MetricsSnapshot = parse_json(&old_json)?;
                let current: MetricsSnapshot = parse_json(&new_json)?;
                Ok(Some(MetricsChange::between(&old, &current)))
            }
            _ => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Work orders
    // -----------------------------------------------------------------------

    /// Queue a growth action for the external deployer.
    ///
    /// At most one pending order exists per action: re-queueing an action
    /// that is still pending returns the existing order's id.
    pub fn enqueue_work_order(&self, action: &EvolutionAction, at: DateTime<Utc>) -> Result<String> {
        let action_json = serde_json::to_string(action)?;
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM work_orders WHERE status = 'pending' AND action_json = ?1",
                params![action_json],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let id = ulid::Ulid::new().to_string();
        self.conn.execute(
            "INSERT INTO work_orders (id, action_type, action_json, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, action.kind(), action_json, ts(at)],
        )?;
        Ok(id)
    }

    pub fn pending_work_orders(&self) -> Result<Vec<WorkOrder>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, action_json, status, created_at FROM work_orders
             WHERE status = 'pending' ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(WorkOrder {
                id: row.get(0)?,
                action: parse_json(&row.get::<_, String>(1)?)?,
                status: row.get(2)?,
                created_at: parse_ts(&row.get::<_, String>(3)?)?,
            })
        })?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?);
        }
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, hour, 0, 0).unwrap()
    }

    fn snapshot(treasury_eth: f64, holder_count: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            treasury_eth,
            holder_count,
            ..MetricsSnapshot::default()
        }
    }

    #[test]
    fn test_kv_roundtrip() {
        let journal = Journal::open_memory().unwrap();
        assert_eq!(journal.kv_get("missing").unwrap(), None);
        journal.kv_set("k", "v1").unwrap();
        journal.kv_set("k", "v2").unwrap();
        assert_eq!(journal.kv_get("k").unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn test_cycle_and_action_log() {
        let journal = Journal::open_memory().unwrap();
        let cycle = journal.begin_cycle(at(1), false, &snapshot(1.0, 10)).unwrap();
        journal
            .log_action(&cycle, &EvolutionAction::PostMetrics, ActionOutcome::Executed, None, at(1))
            .unwrap();
        journal
            .log_action(
                &cycle,
                &EvolutionAction::DeployAdvancedStaking,
                ActionOutcome::Rejected,
                Some("insufficient gas runway"),
                at(1),
            )
            .unwrap();
        journal
            .finish_cycle(&cycle, at(2), CycleTally { executed: 1, rejected: 1, failed: 0 }, true)
            .unwrap();

        assert_eq!(journal.cycle_count().unwrap(), 1);
        let records = journal.cycle_actions(&cycle).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].outcome, ActionOutcome::Rejected);
        assert_eq!(records[1].action, EvolutionAction::DeployAdvancedStaking);
        assert!(journal.kv_get("last_cycle_at").unwrap().is_some());
    }

    #[test]
    fn test_metrics_change_over_window() {
        let journal = Journal::open_memory().unwrap();
        assert_eq!(journal.metrics_change(at(12), 24).unwrap(), None);

        journal.record_metrics(&snapshot(1.0, 100), at(1)).unwrap();
        assert_eq!(journal.metrics_change(at(12), 24).unwrap(), None);

        journal.record_metrics(&snapshot(1.5, 130), at(5)).unwrap();
        journal.record_metrics(&snapshot(1.25, 160), at(9)).unwrap();

        let change = journal.metrics_change(at(12), 24).unwrap().unwrap();
        assert_eq!(change.treasury_eth, 0.25);
        assert_eq!(change.holder_count, 60);

        // Window starting at 04:00 excludes the first snapshot.
        let change = journal.metrics_change(at(12), 8).unwrap().unwrap();
        assert_eq!(change.holder_count, 30);

        let (latest, taken_at) = journal.latest_metrics().unwrap().unwrap();
        assert_eq!(latest.holder_count, 160);
        assert_eq!(taken_at, at(9));
    }

    #[test]
    fn test_work_orders() {
        let journal = Journal::open_memory().unwrap();
        let action = EvolutionAction::ExecuteProposal { proposal_id: "p9".into() };
        let id = journal.enqueue_work_order(&action, at(3)).unwrap();

        let pending = journal.pending_work_orders().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].action, action);
        assert_eq!(pending[0].created_at, at(3));
    }

    #[test]
    fn test_pending_work_order_not_duplicated() {
        let journal = Journal::open_memory().unwrap();
        let action = EvolutionAction::ExecuteProposal { proposal_id: "p1".into() };
        let first = journal.enqueue_work_order(&action, at(3)).unwrap();
        let again = journal.enqueue_work_order(&action, at(7)).unwrap();
        assert_eq!(first, again);

        let other = EvolutionAction::ExecuteProposal { proposal_id: "p2".into() };
        assert_ne!(journal.enqueue_work_order(&other, at(7)).unwrap(), first);

        let pending = journal.pending_work_orders().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].created_at, at(3));
    }

    #[test]
    fn test_reopen_file_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        {
            let journal = Journal::open(&path).unwrap();
            journal.kv_set("marker", "1").unwrap();
        }
        let journal = Journal::open(&path).unwrap();
        assert_eq!(journal.kv_get("marker").unwrap().as_deref(), Some("1"));
    }
}
