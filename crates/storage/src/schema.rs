// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema definitions and idempotent migrations.
//!
//! Timestamps are epoch milliseconds (INTEGER) throughout. Tables are
//! created with `IF NOT EXISTS`; column additions for schema drift are
//! guarded by catalog checks so they are safe on populated databases.

use crate::Result;
use rusqlite::Connection;

/// Core tables: the tracker projection plus the extension tables owned by
/// the control plane.
const SCHEMA_TABLES_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS issues (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        acceptance_criteria TEXT NOT NULL DEFAULT '',
        issue_type TEXT NOT NULL DEFAULT 'task',
        status TEXT NOT NULL DEFAULT 'open',
        priority INTEGER NOT NULL DEFAULT 2,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        closed_at INTEGER
    );

    -- issue_id depends on depends_on_id. For 'blocks', depends_on_id is
    -- the blocker; for 'parent-child', depends_on_id is the parent.
    CREATE TABLE IF NOT EXISTS dependencies (
        issue_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
        depends_on_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
        dep_type TEXT NOT NULL DEFAULT 'blocks',
        created_at INTEGER NOT NULL,
        PRIMARY KEY (issue_id, depends_on_id, dep_type)
    );

    CREATE TABLE IF NOT EXISTS labels (
        issue_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
        label TEXT NOT NULL,
        PRIMARY KEY (issue_id, label)
    );

    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id TEXT NOT NULL,
        event_type TEXT NOT NULL DEFAULT '',
        actor TEXT NOT NULL DEFAULT '',
        comment TEXT,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
        author TEXT NOT NULL DEFAULT '',
        body TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS config (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS mission_state (
        issue_id TEXT PRIMARY KEY REFERENCES issues(id) ON DELETE CASCADE,
        subtype TEXT NOT NULL DEFAULT 'normal',
        goal TEXT NOT NULL DEFAULT '',
        sandbox_path TEXT,
        branch TEXT,
        phase_count INTEGER NOT NULL DEFAULT 0,
        current_phase INTEGER NOT NULL DEFAULT 0,
        approval TEXT NOT NULL DEFAULT 'pending',
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS executor_instances (
        instance_id TEXT PRIMARY KEY,
        hostname TEXT NOT NULL DEFAULT '',
        pid INTEGER NOT NULL DEFAULT 0,
        version TEXT NOT NULL DEFAULT '',
        started_at INTEGER NOT NULL,
        last_heartbeat INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'running',
        updated_at INTEGER NOT NULL
    );

    -- Executor FK is SET NULL, never CASCADE: deleting an executor row
    -- must not destroy checkpoint data.
    CREATE TABLE IF NOT EXISTS issue_execution_state (
        issue_id TEXT PRIMARY KEY REFERENCES issues(id) ON DELETE CASCADE,
        executor_instance_id TEXT REFERENCES executor_instances(instance_id) ON DELETE SET NULL,
        claimed_at INTEGER,
        state TEXT NOT NULL DEFAULT 'pending',
        checkpoint_data TEXT,
        error_message TEXT,
        intervention_count INTEGER NOT NULL DEFAULT 0,
        last_intervention_time INTEGER,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS execution_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id TEXT NOT NULL,
        executor_instance_id TEXT NOT NULL,
        started_at INTEGER NOT NULL,
        finished_at INTEGER,
        success INTEGER,
        exit_code INTEGER,
        summary TEXT,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS mission_plans (
        mission_id TEXT PRIMARY KEY REFERENCES issues(id) ON DELETE CASCADE,
        status TEXT NOT NULL DEFAULT 'draft',
        body TEXT NOT NULL DEFAULT '',
        iteration INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS gate_baselines (
        issue_id TEXT PRIMARY KEY REFERENCES issues(id) ON DELETE CASCADE,
        baseline TEXT NOT NULL DEFAULT '{}',
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS review_checkpoints (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id TEXT NOT NULL,
        reviewer TEXT NOT NULL DEFAULT '',
        verdict TEXT NOT NULL DEFAULT '',
        notes TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS agent_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        severity TEXT NOT NULL DEFAULT 'info',
        issue_id TEXT,
        executor_instance_id TEXT,
        message TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS quota_snapshots (
        id TEXT PRIMARY KEY,
        taken_at INTEGER NOT NULL,
        hourly_tokens INTEGER NOT NULL DEFAULT 0,
        hourly_cost REAL NOT NULL DEFAULT 0,
        total_tokens INTEGER NOT NULL DEFAULT 0,
        total_cost REAL NOT NULL DEFAULT 0,
        unique_issues INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS quota_operations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id TEXT,
        operation TEXT NOT NULL DEFAULT 'other',
        model TEXT NOT NULL DEFAULT '',
        input_tokens INTEGER NOT NULL DEFAULT 0,
        output_tokens INTEGER NOT NULL DEFAULT 0,
        cost REAL NOT NULL DEFAULT 0,
        recorded_at INTEGER NOT NULL
    );
";

/// Indexes are created after migrations so they never reference a column
/// an old database is still missing.
const SCHEMA_INDEXES_SQL: &str = r"
    CREATE INDEX IF NOT EXISTS idx_issues_ready
        ON issues(status, priority, created_at)
        WHERE status = 'open';
    CREATE INDEX IF NOT EXISTS idx_issues_updated ON issues(updated_at);
    CREATE INDEX IF NOT EXISTS idx_dependencies_reverse ON dependencies(depends_on_id);
    CREATE INDEX IF NOT EXISTS idx_dependencies_type ON dependencies(dep_type, issue_id);
    CREATE INDEX IF NOT EXISTS idx_labels_label ON labels(label);
    CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at);
    CREATE INDEX IF NOT EXISTS idx_comments_issue ON comments(issue_id);
    CREATE INDEX IF NOT EXISTS idx_mission_state_updated ON mission_state(updated_at);
    CREATE INDEX IF NOT EXISTS idx_executor_instances_heartbeat
        ON executor_instances(status, last_heartbeat);
    CREATE INDEX IF NOT EXISTS idx_executor_instances_updated ON executor_instances(updated_at);
    CREATE INDEX IF NOT EXISTS idx_execution_state_state ON issue_execution_state(state);
    CREATE INDEX IF NOT EXISTS idx_execution_state_updated ON issue_execution_state(updated_at);
    CREATE INDEX IF NOT EXISTS idx_execution_history_issue ON execution_history(issue_id);
    CREATE INDEX IF NOT EXISTS idx_execution_history_updated ON execution_history(updated_at);
    CREATE INDEX IF NOT EXISTS idx_mission_plans_status ON mission_plans(status, updated_at);
    CREATE INDEX IF NOT EXISTS idx_mission_plans_updated ON mission_plans(updated_at);
    CREATE INDEX IF NOT EXISTS idx_gate_baselines_updated ON gate_baselines(updated_at);
    CREATE INDEX IF NOT EXISTS idx_review_checkpoints_issue ON review_checkpoints(issue_id);
    CREATE INDEX IF NOT EXISTS idx_review_checkpoints_created ON review_checkpoints(created_at);
    CREATE INDEX IF NOT EXISTS idx_agent_events_created ON agent_events(created_at);
    CREATE INDEX IF NOT EXISTS idx_quota_snapshots_taken ON quota_snapshots(taken_at);
    CREATE INDEX IF NOT EXISTS idx_quota_operations_recorded ON quota_operations(recorded_at);
    CREATE INDEX IF NOT EXISTS idx_quota_operations_issue ON quota_operations(issue_id);
";

/// Column-add migrations for databases created before a column existed.
/// Each entry is `(column, definition)`; applied only when the catalog
/// says the column is missing. Definitions must carry defaults so they
/// are safe on populated tables.
const EXECUTION_STATE_COLUMNS: &[(&str, &str)] = &[
    ("checkpoint_data", "TEXT"),
    ("error_message", "TEXT"),
    ("intervention_count", "INTEGER NOT NULL DEFAULT 0"),
    ("last_intervention_time", "INTEGER"),
];

const MISSION_STATE_COLUMNS: &[(&str, &str)] = &[
    ("sandbox_path", "TEXT"),
    ("branch", "TEXT"),
    ("phase_count", "INTEGER NOT NULL DEFAULT 0"),
    ("current_phase", "INTEGER NOT NULL DEFAULT 0"),
    ("approval", "TEXT NOT NULL DEFAULT 'pending'"),
];

const EXECUTOR_COLUMNS: &[(&str, &str)] = &[
    ("version", "TEXT NOT NULL DEFAULT ''"),
    ("status", "TEXT NOT NULL DEFAULT 'running'"),
];

const HISTORY_COLUMNS: &[(&str, &str)] = &[
    ("exit_code", "INTEGER"),
    ("summary", "TEXT"),
];

/// Apply tables, migrations, and indexes. Idempotent.
pub(crate) fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_TABLES_SQL)?;
    run_migrations(conn)?;
    conn.execute_batch(SCHEMA_INDEXES_SQL)?;
    Ok(())
}

/// Run the column-add migration set inside one transaction.
fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("BEGIN")?;
    let result = (|| -> Result<()> {
        ensure_columns(conn, "issue_execution_state", EXECUTION_STATE_COLUMNS)?;
        ensure_columns(conn, "mission_state", MISSION_STATE_COLUMNS)?;
        ensure_columns(conn, "executor_instances", EXECUTOR_COLUMNS)?;
        ensure_columns(conn, "execution_history", HISTORY_COLUMNS)?;
        Ok(())
    })();
    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    // pragma_table_info cannot be parameterized; table names here come
    // from the constants above, never from input.
    let sql = format!("SELECT 1 FROM pragma_table_info('{table}') WHERE name = ?");
    conn.prepare(&sql)
        .and_then(|mut stmt| stmt.exists([column]))
        .unwrap_or(false)
}

fn ensure_columns(conn: &Connection, table: &str, columns: &[(&str, &str)]) -> Result<()> {
    for (name, definition) in columns {
        if !column_exists(conn, table, name) {
            tracing::info!(table, column = name, "adding missing column");
            let sql = format!("ALTER TABLE {table} ADD COLUMN {name} {definition}");
            conn.execute(&sql, [])?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
