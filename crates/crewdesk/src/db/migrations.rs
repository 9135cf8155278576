//! Schema migrations for the jobs database.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration
//! runs in its own `IMMEDIATE` transaction together with its bookkeeping
//! row, so two processes opening a fresh file cannot both apply it.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_jobs_table",
        sql: include_str!("sql/001_create_jobs.sql"),
    },
    Migration {
        version: 2,
        description: "create_driver_window_index",
        sql: include_str!("sql/002_create_driver_window_index.sql"),
    },
];

fn applied_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

/// Brings the schema up to the latest version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let latest = MIGRATIONS.last().map_or(0, |m| m.version);
    if applied_version(conn)? >= latest {
        return Ok(());
    }

    for migration in MIGRATIONS {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

        // Another connection may have got here first.
        if applied_version(&tx)? >= migration.version {
            continue;
        }

        log::info!(
            "Applying schema v{} ({})",
            migration.version,
            migration.description
        );

        tx.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
        tx.commit()?;
    }

    Ok(())
}
