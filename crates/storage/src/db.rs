// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database handle: pool, open/close semantics, busy retry, export guard.

use crate::error::StoreError;
use crate::schema;
use crate::Result;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

/// Directory under the project root holding the database and export.
const STATE_DIR: &str = ".beads";
/// Database file name inside [`STATE_DIR`].
const DB_FILE: &str = "foreman.db";
/// Canonical JSONL export the tracker writes next to the database.
const EXPORT_FILE: &str = "issues.jsonl";

/// Filesystem timestamp precision tolerance for the export guard.
const EXPORT_MTIME_TOLERANCE: Duration = Duration::from_secs(1);

/// Retry budget for SQLITE_BUSY/SQLITE_LOCKED.
const BUSY_RETRY_ATTEMPTS: u32 = 5;
/// First retry delay; doubles per attempt.
const BUSY_RETRY_BASE: Duration = Duration::from_millis(10);

/// Shared handle to one project database.
///
/// Queries run on pooled connections; schema DDL runs on a single scoped
/// connection during `open`. `close` poisons the handle: every subsequent
/// call fails with [`StoreError::Closed`].
pub struct Database {
    pool: r2d2::Pool<SqliteConnectionManager>,
    path: PathBuf,
    closed: AtomicBool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Database {
    /// Open (creating if needed) the project database at
    /// `<project_root>/.beads/foreman.db`.
    ///
    /// Runs the export staleness guard, bootstraps the schema, applies
    /// idempotent column-add migrations, and creates indexes.
    pub fn open(project_root: &Path) -> Result<Self> {
        let dir = project_root.join(STATE_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join(DB_FILE);

        check_export_freshness(&dir, &path)?;

        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(())
        });
        let pool = r2d2::Pool::builder().max_size(8).build(manager)?;

        let db = Self { pool, path, closed: AtomicBool::new(false) };

        {
            // Scoped DDL connection: schema, migrations, indexes.
            let conn = db.pool.get()?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            schema::apply_schema(&conn)?;
        }

        tracing::debug!(path = %db.path.display(), "database open");
        Ok(db)
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the pool. All subsequent calls fail with `Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!(path = %self.path.display(), "database closed");
    }

    /// Get a pooled connection, refusing when the handle is closed.
    pub(crate) fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(self.pool.get()?)
    }
}

/// True for SQLITE_BUSY / SQLITE_LOCKED.
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::DatabaseBusy
                || f.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

/// Run `op`, retrying busy/locked failures with exponential backoff
/// (10 ms × 2^(attempt−1), 5 attempts). Non-busy errors fail immediately;
/// exhaustion surfaces as [`StoreError::Busy`].
pub(crate) fn with_busy_retry<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 1u32;
    loop {
        match op() {
            Err(StoreError::Sqlite(e)) if is_busy(&e) => {
                if attempt >= BUSY_RETRY_ATTEMPTS {
                    return Err(StoreError::Busy { attempts: attempt, source: e });
                }
                let delay = BUSY_RETRY_BASE * 2u32.pow(attempt - 1);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "database busy, retrying");
                std::thread::sleep(delay);
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Fail startup when the JSONL export leads the database by more than the
/// filesystem-precision tolerance: the database would dispatch against
/// stale issue data until someone re-imports.
fn check_export_freshness(dir: &Path, db_path: &Path) -> Result<()> {
    let export = dir.join(EXPORT_FILE);
    let Some(export_mtime) = mtime(&export) else {
        return Ok(());
    };

    let wal = db_path.with_extension("db-wal");
    let shm = db_path.with_extension("db-shm");
    let newest_db = [db_path, wal.as_path(), shm.as_path()]
        .iter()
        .filter_map(|p| mtime(p))
        .max();

    let fresh = match newest_db {
        Some(db_mtime) => export_mtime <= db_mtime + EXPORT_MTIME_TOLERANCE,
        // Export exists but no database: must import first.
        None => false,
    };

    if fresh {
        Ok(())
    } else {
        Err(StoreError::StaleExport { export })
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
