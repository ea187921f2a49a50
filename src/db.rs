use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::{backup, config, schema};

fn set_pragmas(conn: &Connection) -> Result<()> {
    // No WAL: snapshots copy the main file only.
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    set_pragmas(&conn)?;
    Ok(conn)
}

/// Handle to the primary database file.
///
/// Holds no connection: every operation calls [`Database::connect`] and drops
/// the connection when it is done.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    machine: String,
}

impl Database {
    /// Run the open sequence (restore, snapshot, prune, schema) for `path` and
    /// return a handle that reads and writes paths as `machine`.
    pub fn open(path: impl Into<PathBuf>, machine: impl Into<String>) -> Result<Self> {
        let today = chrono::Local::now().date_naive();
        Self::open_on(path, machine, today)
    }

    /// [`Database::open`] with an explicit calendar date for the snapshot name.
    pub fn open_on(
        path: impl Into<PathBuf>,
        machine: impl Into<String>,
        today: NaiveDate,
    ) -> Result<Self> {
        let path = std::path::absolute(path.into())?;
        config::ensure_parent_dir(&path)?;

        backup::run_on_open(&path, today);

        let conn = open(&path)?;
        schema::ensure_schema(&conn);

        Ok(Self {
            path,
            machine: machine.into(),
        })
    }

    pub fn connect(&self) -> Result<Connection> {
        open(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }
}

#[cfg(test)]
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    set_pragmas(&conn)?;
    schema::ensure_schema(&conn);
    Ok(conn)
}
