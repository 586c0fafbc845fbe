//! Report store backed by SQLite.
//!
//! Every operation opens its own connection on the blocking pool, runs one
//! unit of work and drops the connection on the way out, whether the work
//! succeeded or not. Concurrent writers are serialized by SQLite itself
//! (WAL journal plus a busy timeout), not by this module.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use rusqlite::{Connection, OpenFlags};

pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

use migrations::run_migrations;
pub use models::{HazardCategory, HazardReport, NewReport, ReportId, UNKNOWN_CATEGORY};

use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    db_path: Arc<PathBuf>,
}

impl Database {
    /// Creates the database file if needed and brings the schema up to date.
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let mut conn = Connection::open(&db_path).with_context(|| {
            format!("failed to open SQLite database {}", db_path.display())
        })?;

        // WAL persists in the file, so later per-call connections inherit it.
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .context("failed to enable WAL mode")?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            log_warn!("SQLite kept journal_mode={journal_mode}; concurrent readers may block");
        }

        run_migrations(&mut conn).context("failed to run database migrations")?;
        drop(conn);

        log_info!("Database initialized at {}", db_path.display());

        Ok(Self {
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    fn open_connection(path: &Path) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("failed to set SQLite busy timeout")?;
        Ok(conn)
    }

    /// Runs `task` against a fresh connection on the blocking pool.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = Arc::clone(&self.db_path);

        tokio::task::spawn_blocking(move || {
            let mut conn = Self::open_connection(&path)?;
            task(&mut conn)
        })
        .await
        .map_err(|err| anyhow!("database task terminated unexpectedly: {err}"))?
    }
}
