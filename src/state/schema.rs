//! Journal schema definitions.

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Full DDL for the cycle journal.
pub const CREATE_SCHEMA: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

-- Key-value store for runtime markers
CREATE TABLE IF NOT EXISTS kv (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per evaluation cycle
CREATE TABLE IF NOT EXISTS cycles (
    id           TEXT PRIMARY KEY,
    started_at   TEXT NOT NULL,
    finished_at  TEXT,
    dry_run      INTEGER NOT NULL DEFAULT 0,
    treasury_eth REAL NOT NULL,
    holder_count INTEGER NOT NULL,
    executed     INTEGER NOT NULL DEFAULT 0,
    rejected     INTEGER NOT NULL DEFAULT 0,
    failed       INTEGER NOT NULL DEFAULT 0,
    persisted    INTEGER NOT NULL DEFAULT 0
);

-- What happened to every proposed action
CREATE TABLE IF NOT EXISTS action_log (
    id          TEXT PRIMARY KEY,
    cycle_id    TEXT NOT NULL REFERENCES cycles(id),
    action_type TEXT NOT NULL,
    action_json TEXT NOT NULL,
    priority    INTEGER NOT NULL,
    outcome     TEXT NOT NULL,
    detail      TEXT,
    created_at  TEXT NOT NULL
);

-- Metrics history
CREATE TABLE IF NOT EXISTS metrics_snapshots (
    id           TEXT PRIMARY KEY,
    taken_at     TEXT NOT NULL,
    metrics_json TEXT NOT NULL
);

-- Growth actions handed to the external deployer
CREATE TABLE IF NOT EXISTS work_orders (
    id          TEXT PRIMARY KEY,
    action_type TEXT NOT NULL,
    action_json TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'pending',
    created_at  TEXT NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_action_log_cycle ON action_log(cycle_id);
CREATE INDEX IF NOT EXISTS idx_metrics_taken ON metrics_snapshots(taken_at);
CREATE INDEX IF NOT EXISTS idx_work_orders_status ON work_orders(status);
CREATE UNIQUE INDEX IF NOT EXISTS idx_work_orders_pending_action
    ON work_orders(action_json) WHERE status = 'pending';
"#;
