// Database module

pub mod migrations;

use rusqlite::Connection;
use std::path::Path;
use anyhow::Result;

use crate::constants::DB_BUSY_TIMEOUT_MS;

/// Open or create the inventory database, creating its directory and running migrations.
/// Call once at startup; per-cycle connections use open_db_connection().
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Cannot create database directory {}: {}. Check directory permissions.",
                parent.display(),
                e
            )
        })?;
    }

    let conn = Connection::open(db_path)?;
    apply_pragmas(&conn)?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Open a short-lived connection with pragmas set. Does NOT run migrations.
pub fn open_db_connection(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Call open_db() first.",
            db_path.display()
        );
    }

    let conn = Connection::open(db_path)?;
    apply_pragmas(&conn)?;

    Ok(conn)
}

/// In-memory database with the full schema, for tests and dry runs
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    // WAL lets the reconcile thread and admin commands share the file
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(std::time::Duration::from_millis(DB_BUSY_TIMEOUT_MS as u64))?;
    Ok(())
}
