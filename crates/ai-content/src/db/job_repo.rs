//! Job repository: CRUD operations for the `jobs` table.
//!
//! Functions take a `&Connection` so that the job store can compose them
//! inside a single transaction (see `Database::with_transaction`).

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

const SELECT_COLUMNS: &str = "SELECT rowid AS seq, id, generation_id, provider, content_type,
    fingerprint, prompt, status, output_path, command, forced, error_kind, error_message, metadata,
    created_at, updated_at FROM jobs";

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    /// SQLite rowid. Ignored on insert; used as a tie-breaker for ordering.
    pub seq: i64,
    pub id: String,
    pub generation_id: Option<String>,
    pub provider: String,
    pub content_type: String,
    pub fingerprint: String,
    pub prompt: String,
    pub status: String,
    pub output_path: Option<String>,
    pub command: Option<String>,
    pub forced: bool,
    /// `GenerationErrorKind` name of a failed job.
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    /// JSON object of the request's material parameters.
    pub metadata: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            seq: row.get("seq")?,
            id: row.get("id")?,
            generation_id: row.get("generation_id")?,
            provider: row.get("provider")?,
            content_type: row.get("content_type")?,
            fingerprint: row.get("fingerprint")?,
            prompt: row.get("prompt")?,
            status: row.get("status")?,
            output_path: row.get("output_path")?,
            command: row.get("command")?,
            forced: row.get("forced")?,
            error_kind: row.get("error_kind")?,
            error_message: row.get("error_message")?,
            metadata: row.get("metadata")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    /// Match any of these statuses. Empty means all statuses.
    pub statuses: Vec<String>,
    pub provider: Option<String>,
    pub content_type: Option<String>,
}

/// Position of the last row of a page, for keyset pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: String,
    pub seq: i64,
}

impl From<&JobRow> for PageCursor {
    fn from(row: &JobRow) -> Self {
        Self {
            created_at: row.created_at.clone(),
            seq: row.seq,
        }
    }
}

/// Inserts a new job row.
pub fn insert(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, generation_id, provider, content_type, fingerprint, prompt,
         status, output_path, command, forced, error_kind, error_message, metadata, created_at,
         updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            job.id,
            job.generation_id,
            job.provider,
            job.content_type,
            job.fingerprint,
            job.prompt,
            job.status,
            job.output_path,
            job.command,
            job.forced,
            job.error_kind,
            job.error_message,
            job.metadata,
            job.created_at,
            job.updated_at,
        ],
    )?;
    Ok(())
}

/// Updates the mutable lifecycle fields of an existing job row.
///
/// Identity and request fields (`id`, `fingerprint`, `prompt`, `created_at`, ...)
/// are never rewritten. Returns the number of affected rows.
pub fn update(conn: &Connection, job: &JobRow) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET generation_id=?2, status=?3, output_path=?4, error_kind=?5,
         error_message=?6, updated_at=?7 WHERE id=?1",
        params![
            job.id,
            job.generation_id,
            job.status,
            job.output_path,
            job.error_kind,
            job.error_message,
            job.updated_at,
        ],
    )?;
    Ok(changed)
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
    let row = conn
        .query_row(&sql, params![id], JobRow::from_row)
        .optional()?;
    Ok(row)
}

/// Finds a job by the identifier its provider assigned.
pub fn find_by_generation_id(
    conn: &Connection,
    generation_id: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    let sql = format!("{} WHERE generation_id = ?1", SELECT_COLUMNS);
    let row = conn
        .query_row(&sql, params![generation_id], JobRow::from_row)
        .optional()?;
    Ok(row)
}

/// Returns the most recently created job with the given fingerprint,
/// optionally ignoring jobs in `exclude_status`.
pub fn find_latest_by_fingerprint(
    conn: &Connection,
    fingerprint: &str,
    exclude_status: Option<&str>,
) -> Result<Option<JobRow>, DatabaseError> {
    let sql = format!(
        "{} WHERE fingerprint = ?1 AND (?2 IS NULL OR status != ?2)
         ORDER BY created_at DESC, seq DESC LIMIT 1",
        SELECT_COLUMNS
    );
    let row = conn
        .query_row(&sql, params![fingerprint, exclude_status], JobRow::from_row)
        .optional()?;
    Ok(row)
}

/// Fetches one page of jobs in reverse-chronological order, starting
/// strictly after `after` when given.
pub fn query_page(
    conn: &Connection,
    filter: &JobFilter,
    after: Option<&PageCursor>,
    page_size: u64,
) -> Result<Vec<JobRow>, DatabaseError> {
    let mut conditions = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if !filter.statuses.is_empty() {
        let placeholders: Vec<String> = filter
            .statuses
            .iter()
            .map(|status| {
                param_values.push(Box::new(status.clone()));
                format!("?{}", param_values.len())
            })
            .collect();
        conditions.push(format!("status IN ({})", placeholders.join(", ")));
    }
    if let Some(ref provider) = filter.provider {
        conditions.push(format!("provider = ?{}", param_values.len() + 1));
        param_values.push(Box::new(provider.clone()));
    }
    if let Some(ref content_type) = filter.content_type {
        conditions.push(format!("content_type = ?{}", param_values.len() + 1));
        param_values.push(Box::new(content_type.clone()));
    }
    if let Some(cursor) = after {
        let created_idx = param_values.len() + 1;
        param_values.push(Box::new(cursor.created_at.clone()));
        let seq_idx = param_values.len() + 1;
        param_values.push(Box::new(cursor.seq));
        conditions.push(format!(
            "(created_at < ?{c} OR (created_at = ?{c} AND rowid < ?{s}))",
            c = created_idx,
            s = seq_idx
        ));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    param_values.push(Box::new(page_size as i64));
    let sql = format!(
        "{} {} ORDER BY created_at DESC, seq DESC LIMIT ?{}",
        SELECT_COLUMNS,
        where_clause,
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows: Vec<JobRow> = stmt
        .query_map(params_ref.as_slice(), JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}
