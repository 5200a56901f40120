//! Job statistics repository: aggregate counts over the `jobs` table.

use rusqlite::{params, Connection};

use super::DatabaseError;

/// Column a job count can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Status,
    Provider,
    ContentType,
}

impl GroupBy {
    fn column(self) -> &'static str {
        match self {
            GroupBy::Status => "status",
            GroupBy::Provider => "provider",
            GroupBy::ContentType => "content_type",
        }
    }
}

/// Total number of jobs.
pub fn count_total(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
    Ok(count)
}

/// Job counts grouped by a single column, sorted by key.
pub fn count_grouped(conn: &Connection, group: GroupBy) -> Result<Vec<(String, u64)>, DatabaseError> {
    let column = group.column();
    let sql = format!(
        "SELECT {col}, COUNT(*) FROM jobs GROUP BY {col} ORDER BY {col}",
        col = column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Per-provider counts of jobs that reached the provider and did not fail.
///
/// These are the jobs a provider is expected to bill for.
pub fn count_billable_by_provider(conn: &Connection) -> Result<Vec<(String, u64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT provider, COUNT(*) FROM jobs WHERE status != 'failed'
         GROUP BY provider ORDER BY provider",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of jobs created at or after `since` (RFC 3339, same format as `created_at`).
pub fn count_created_since(conn: &Connection, since: &str) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM jobs WHERE created_at >= ?1",
        params![since],
        |r| r.get(0),
    )?;
    Ok(count)
}
