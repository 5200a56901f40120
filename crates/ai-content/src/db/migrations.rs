//! Versioned schema setup for the job database.
//!
//! The applied version is kept in SQLite's `user_version` header field.
//! Each pending script runs in its own transaction together with the
//! version bump, so a failed script leaves the previous version intact.

use rusqlite::Connection;

use super::error::DatabaseError;

/// Schema scripts; script `i` upgrades the database to version `i + 1`.
const SCRIPTS: &[(&str, &str)] = &[("create_jobs", include_str!("sql/001_create_jobs.sql"))];

/// Version a fully migrated database reports.
pub const LATEST_VERSION: u32 = SCRIPTS.len() as u32;

/// Current `user_version` of the database.
pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}

/// Brings the schema up to [`LATEST_VERSION`].
///
/// A database written by a newer build is rejected rather than modified.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    let current = schema_version(conn)?;
    if current > LATEST_VERSION {
        return Err(DatabaseError::Migration {
            version: current,
            reason: format!(
                "database schema is newer than this build supports (v{})",
                LATEST_VERSION
            ),
        });
    }

    for (index, (name, sql)) in SCRIPTS.iter().enumerate().skip(current as usize) {
        let version = index as u32 + 1;
        log::info!("Applying schema v{} ({})", version, name);

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .and_then(|_| tx.pragma_update(None, "user_version", version))
            .map_err(|e| DatabaseError::Migration {
                version,
                reason: e.to_string(),
            })?;
        tx.commit()?;
    }

    Ok(())
}
