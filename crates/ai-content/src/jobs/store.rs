//! Job Store: typed, transition-checked access to persisted jobs.
//!
//! All writes go through [`Database::with_transaction`], so a status change
//! re-reads the current row and validates the transition while holding the
//! connection lock. Check-then-create for a fingerprint runs the same way
//! and is additionally backed by a partial unique index on in-flight
//! unforced jobs.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::job_repo::{self, JobFilter, JobRow, PageCursor};
use crate::db::stats_repo::{self, GroupBy};
use crate::db::{Database, DatabaseError};
use crate::provider::GenerationErrorKind;

use super::model::{ContentType, Job, JobStatus, JobUpdate, NewJob};

/// Rows fetched per round trip by [`JobIter`].
const PAGE_SIZE: usize = 50;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate {field} '{value}'")]
    DuplicateIdentifier { field: &'static str, value: String },

    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Stored job '{job_id}' is unreadable: {reason}")]
    InvalidData { job_id: String, reason: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result of [`JobStore::create_unless_duplicate`].
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(Job),
    /// A non-failed job with the same fingerprint already exists.
    Existing(Job),
}

/// Listing filter. Empty `statuses` matches every status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobQuery {
    pub statuses: Vec<JobStatus>,
    pub provider: Option<String>,
    pub content_type: Option<ContentType>,
    pub limit: Option<usize>,
}

impl JobQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queued and processing jobs.
    pub fn pending() -> Self {
        Self::new()
            .status(JobStatus::Queued)
            .status(JobStatus::Processing)
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn to_filter(&self) -> JobFilter {
        JobFilter {
            statuses: self.statuses.iter().map(|s| s.as_str().to_string()).collect(),
            provider: self.provider.as_ref().map(|p| p.trim().to_lowercase()),
            content_type: self.content_type.map(|c| c.as_str().to_string()),
        }
    }
}

/// Aggregate counts over all jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStats {
    pub total: u64,
    /// Every status is present, zero-filled.
    pub by_status: BTreeMap<JobStatus, u64>,
    pub by_provider: BTreeMap<String, u64>,
    /// Every content type is present, zero-filled.
    pub by_content_type: BTreeMap<ContentType, u64>,
    /// Jobs created within the last 24 hours.
    pub recent_24h: u64,
    /// Sum of non-failed jobs times the provider's unit cost; `None`
    /// when no unit costs were supplied.
    pub estimated_cost: Option<f64>,
}

/// Durable job storage backed by [`Database`].
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persists a new queued job. Timestamps are assigned here.
    pub fn create(&self, new_job: NewJob) -> Result<Job, StoreError> {
        self.db
            .with_transaction(|conn| insert_new(conn, &new_job))
    }

    pub fn get(&self, job_id: &str) -> Result<Job, StoreError> {
        let row = self.db.with_conn(|conn| job_repo::find_by_id(conn, job_id))?;
        match row {
            Some(row) => row_to_job(row),
            None => Err(StoreError::NotFound(job_id.to_string())),
        }
    }

    /// Most recently created job with this fingerprint, in any status.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Job>, StoreError> {
        let row = self
            .db
            .with_conn(|conn| job_repo::find_latest_by_fingerprint(conn, fingerprint, None))?;
        row.map(row_to_job).transpose()
    }

    /// Most recently created non-failed job with this fingerprint.
    pub fn find_duplicate(&self, fingerprint: &str) -> Result<Option<Job>, StoreError> {
        let row = self.db.with_conn(|conn| {
            job_repo::find_latest_by_fingerprint(
                conn,
                fingerprint,
                Some(JobStatus::Failed.as_str()),
            )
        })?;
        row.map(row_to_job).transpose()
    }

    pub fn find_by_generation_id(&self, generation_id: &str) -> Result<Option<Job>, StoreError> {
        let row = self
            .db
            .with_conn(|conn| job_repo::find_by_generation_id(conn, generation_id))?;
        row.map(row_to_job).transpose()
    }

    /// Creates the job unless a non-failed job with the same fingerprint
    /// exists. Forced jobs skip the lookup.
    ///
    /// Lookup and insert share one transaction.
    pub fn create_unless_duplicate(&self, new_job: NewJob) -> Result<CreateOutcome, StoreError> {
        if new_job.forced {
            return self.create(new_job).map(CreateOutcome::Created);
        }

        let result = self.db.with_transaction(|conn| {
            let existing = job_repo::find_latest_by_fingerprint(
                conn,
                &new_job.fingerprint,
                Some(JobStatus::Failed.as_str()),
            )?;
            match existing {
                Some(row) => row_to_job(row).map(CreateOutcome::Existing),
                None => insert_new(conn, &new_job).map(CreateOutcome::Created),
            }
        });

        match result {
            // Another process inserted an in-flight job between our lookup and insert.
            Err(StoreError::DuplicateIdentifier {
                field: "fingerprint",
                ..
            }) => match self.find_duplicate(&new_job.fingerprint)? {
                Some(job) => Ok(CreateOutcome::Existing(job)),
                None => Err(StoreError::DuplicateIdentifier {
                    field: "fingerprint",
                    value: new_job.fingerprint.clone(),
                }),
            },
            other => other,
        }
    }

    /// Moves a job to `status`, writing the non-`None` fields of `update`.
    pub fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        update: JobUpdate,
    ) -> Result<Job, StoreError> {
        self.db.with_transaction(|conn| {
            let row = job_repo::find_by_id(conn, job_id)?
                .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
            let current = parse_status(&row)?;
            if !current.can_transition_to(status) {
                return Err(StoreError::InvalidTransition {
                    job_id: job_id.to_string(),
                    from: current,
                    to: status,
                });
            }

            let mut row = row;
            row.status = status.as_str().to_string();
            if let Some(generation_id) = update.generation_id {
                row.generation_id = Some(generation_id);
            }
            if let Some(output_path) = update.output_path {
                row.output_path = Some(output_path);
            }
            if let Some(error_kind) = update.error_kind {
                row.error_kind = Some(error_kind.to_string());
            }
            if let Some(error_message) = update.error_message {
                row.error_message = Some(error_message);
            }
            row.updated_at = now_timestamp();

            job_repo::update(conn, &row).map_err(|e| map_constraint(e, &row))?;
            tracing::debug!(job_id, from = %current, to = %status, "Job status updated");
            row_to_job(row)
        })
    }

    /// Lazily iterates matching jobs, newest first.
    pub fn list(&self, query: JobQuery) -> JobIter {
        JobIter {
            db: self.db.clone(),
            filter: query.to_filter(),
            remaining: query.limit,
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Aggregate counts. `unit_costs` maps provider name to cost per job.
    pub fn stats(&self, unit_costs: &BTreeMap<String, f64>) -> Result<JobStats, StoreError> {
        let since = format_timestamp(Utc::now() - Duration::hours(24));

        let (total, statuses, providers, content_types, billable, recent_24h) =
            self.db.with_conn(|conn| {
                Ok((
                    stats_repo::count_total(conn)?,
                    stats_repo::count_grouped(conn, GroupBy::Status)?,
                    stats_repo::count_grouped(conn, GroupBy::Provider)?,
                    stats_repo::count_grouped(conn, GroupBy::ContentType)?,
                    stats_repo::count_billable_by_provider(conn)?,
                    stats_repo::count_created_since(conn, &since)?,
                ))
            })?;

        let mut by_status: BTreeMap<JobStatus, u64> =
            JobStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for (status, count) in statuses {
            let status = status.parse::<JobStatus>().map_err(|e| StoreError::InvalidData {
                job_id: "*".to_string(),
                reason: e.to_string(),
            })?;
            by_status.insert(status, count);
        }

        let mut by_content_type: BTreeMap<ContentType, u64> =
            ContentType::ALL.iter().map(|c| (*c, 0)).collect();
        for (content_type, count) in content_types {
            let content_type =
                content_type
                    .parse::<ContentType>()
                    .map_err(|e| StoreError::InvalidData {
                        job_id: "*".to_string(),
                        reason: e.to_string(),
                    })?;
            by_content_type.insert(content_type, count);
        }

        let estimated_cost = if unit_costs.is_empty() {
            None
        } else {
            Some(
                billable
                    .iter()
                    .map(|(provider, count)| {
                        unit_costs.get(provider).copied().unwrap_or(0.0) * *count as f64
                    })
                    .sum(),
            )
        };

        Ok(JobStats {
            total,
            by_status,
            by_provider: providers.into_iter().collect(),
            by_content_type,
            recent_24h,
            estimated_cost,
        })
    }
}

/// Lazy, paginated iterator returned by [`JobStore::list`].
///
/// Pages are fetched on demand using a `(created_at, rowid)` keyset, so
/// jobs inserted while iterating never shift the remaining pages.
pub struct JobIter {
    db: Database,
    filter: JobFilter,
    remaining: Option<usize>,
    cursor: Option<PageCursor>,
    buffer: VecDeque<JobRow>,
    exhausted: bool,
}

impl JobIter {
    fn fetch_page(&mut self) -> Result<(), StoreError> {
        let page_size = match self.remaining {
            Some(remaining) => remaining.min(PAGE_SIZE),
            None => PAGE_SIZE,
        };
        let rows = self.db.with_conn(|conn| {
            job_repo::query_page(conn, &self.filter, self.cursor.as_ref(), page_size as u64)
        })?;

        if rows.len() < page_size {
            self.exhausted = true;
        }
        if let Some(last) = rows.last() {
            self.cursor = Some(PageCursor::from(last));
        }
        self.buffer.extend(rows);
        Ok(())
    }
}

impl Iterator for JobIter {
    type Item = Result<Job, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }

        let row = self.buffer.pop_front()?;
        if let Some(ref mut remaining) = self.remaining {
            *remaining -= 1;
        }
        Some(row_to_job(row))
    }
}

fn insert_new(conn: &Connection, new_job: &NewJob) -> Result<Job, StoreError> {
    let now = now_timestamp();
    let row = JobRow {
        seq: 0,
        id: new_job.id.clone(),
        generation_id: None,
        provider: new_job.provider.trim().to_lowercase(),
        content_type: new_job.content_type.as_str().to_string(),
        fingerprint: new_job.fingerprint.clone(),
        prompt: new_job.prompt.clone(),
        status: JobStatus::Queued.as_str().to_string(),
        output_path: None,
        command: new_job.command.clone(),
        forced: new_job.forced,
        error_kind: None,
        error_message: None,
        metadata: Some(new_job.metadata.to_string()),
        created_at: now.clone(),
        updated_at: now,
    };

    job_repo::insert(conn, &row).map_err(|e| map_constraint(e, &row))?;
    tracing::debug!(job_id = %row.id, provider = %row.provider, forced = row.forced, "Job created");
    row_to_job(row)
}

/// Maps a UNIQUE violation to the identifier that collided.
fn map_constraint(err: DatabaseError, row: &JobRow) -> StoreError {
    let message = match err.constraint_message() {
        Some(message) => message,
        None => return StoreError::Database(err),
    };

    if message.contains("generation_id") {
        StoreError::DuplicateIdentifier {
            field: "generation_id",
            value: row.generation_id.clone().unwrap_or_default(),
        }
    } else if message.contains("fingerprint") {
        StoreError::DuplicateIdentifier {
            field: "fingerprint",
            value: row.fingerprint.clone(),
        }
    } else if message.contains("jobs.id") {
        StoreError::DuplicateIdentifier {
            field: "job_id",
            value: row.id.clone(),
        }
    } else {
        StoreError::Database(err)
    }
}

fn parse_status(row: &JobRow) -> Result<JobStatus, StoreError> {
    row.status.parse().map_err(|e: super::model::ParseEnumError| {
        StoreError::InvalidData {
            job_id: row.id.clone(),
            reason: e.to_string(),
        }
    })
}

fn row_to_job(row: JobRow) -> Result<Job, StoreError> {
    let invalid = |reason: String| StoreError::InvalidData {
        job_id: row.id.clone(),
        reason,
    };

    let status = parse_status(&row)?;
    let content_type = row
        .content_type
        .parse::<ContentType>()
        .map_err(|e| invalid(e.to_string()))?;
    let metadata = match row.metadata.as_deref() {
        Some(raw) => serde_json::from_str(raw).map_err(|e| invalid(format!("metadata: {}", e)))?,
        None => serde_json::Value::Object(serde_json::Map::new()),
    };
    let error_kind = row
        .error_kind
        .as_deref()
        .map(str::parse::<GenerationErrorKind>)
        .transpose()
        .map_err(|e| invalid(format!("error_kind: {}", e)))?;
    let created_at = parse_timestamp(&row.created_at).map_err(&invalid)?;
    let updated_at = parse_timestamp(&row.updated_at).map_err(&invalid)?;

    Ok(Job {
        id: row.id,
        generation_id: row.generation_id,
        provider: row.provider,
        content_type,
        fingerprint: row.fingerprint,
        prompt: row.prompt,
        status,
        output_path: row.output_path,
        command: row.command,
        forced: row.forced,
        error_kind,
        error_message: row.error_message,
        metadata,
        created_at,
        updated_at,
    })
}

fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Fixed-width RFC 3339 so that text order matches time order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("timestamp '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::GenerationFailure;
    use serde_json::json;

    fn store() -> JobStore {
        JobStore::new(Database::open_in_memory().unwrap())
    }

    fn new_job(fingerprint: &str) -> NewJob {
        let mut job = NewJob::new("lyria", ContentType::Music, fingerprint, "Smooth jazz");
        job.command = Some("ai-content music --prompt 'Smooth jazz'".to_string());
        job.metadata = json!({"bpm": 95});
        job
    }

    #[test]
    fn test_create_then_get_round_trips() {
        let store = store();
        let input = new_job("fp-1");
        let created = store.create(input.clone()).unwrap();
        let loaded = store.get(&input.id).unwrap();

        assert_eq!(loaded, created);
        assert_eq!(loaded.id, input.id);
        assert_eq!(loaded.provider, "lyria");
        assert_eq!(loaded.content_type, ContentType::Music);
        assert_eq!(loaded.fingerprint, "fp-1");
        assert_eq!(loaded.prompt, "Smooth jazz");
        assert_eq!(loaded.command, input.command);
        assert_eq!(loaded.metadata, json!({"bpm": 95}));
        assert_eq!(loaded.status, JobStatus::Queued);
        assert!(!loaded.forced);
        assert_eq!(loaded.generation_id, None);
        assert_eq!(loaded.output_path, None);
        assert_eq!(loaded.error_kind, None);
        assert_eq!(loaded.error_message, None);
    }

    #[test]
    fn test_create_rejects_duplicate_job_id() {
        let store = store();
        let job = new_job("fp-1");
        store.create(job.clone()).unwrap();

        let mut again = job.clone();
        again.fingerprint = "fp-2".to_string();
        let err = store.create(again).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateIdentifier { field: "job_id", ref value } if *value == job.id
        ));
    }

    #[test]
    fn test_get_missing_job() {
        let err = store().get("nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref id) if id == "nope"));
    }

    #[test]
    fn test_update_status_follows_state_machine() {
        let store = store();
        let job = store.create(new_job("fp-1")).unwrap();

        let job = store
            .update_status(&job.id, JobStatus::Processing, JobUpdate::default().generation_id("gen-1"))
            .unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.generation_id.as_deref(), Some("gen-1"));

        let job = store
            .update_status(&job.id, JobStatus::Completed, JobUpdate::default())
            .unwrap();
        assert_eq!(job.generation_id.as_deref(), Some("gen-1"));
        assert!(job.updated_at >= job.created_at);

        let err = store
            .update_status(&job.id, JobStatus::Queued, JobUpdate::default())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: JobStatus::Completed,
                to: JobStatus::Queued,
                ..
            }
        ));

        let job = store
            .update_status(&job.id, JobStatus::Downloaded, JobUpdate::default().output_path("/tmp/a.mp3"))
            .unwrap();
        assert_eq!(job.output_path.as_deref(), Some("/tmp/a.mp3"));
        assert_eq!(store.get(&job.id).unwrap().status, JobStatus::Downloaded);
    }

    #[test]
    fn test_every_invalid_transition_is_rejected() {
        let store = store();
        for from in JobStatus::ALL {
            for to in JobStatus::ALL {
                if from.can_transition_to(to) {
                    continue;
                }
                let job = store.create(new_job(&format!("{}-{}", from, to))).unwrap();
                let path: &[JobStatus] = match from {
                    JobStatus::Queued => &[],
                    JobStatus::Processing => &[JobStatus::Processing],
                    JobStatus::Completed => &[JobStatus::Processing, JobStatus::Completed],
                    JobStatus::Downloaded => &[
                        JobStatus::Processing,
                        JobStatus::Completed,
                        JobStatus::Downloaded,
                    ],
                    JobStatus::Failed => &[JobStatus::Failed],
                };
                for step in path {
                    store.update_status(&job.id, *step, JobUpdate::default()).unwrap();
                }

                let err = store
                    .update_status(&job.id, to, JobUpdate::default())
                    .unwrap_err();
                assert!(
                    matches!(err, StoreError::InvalidTransition { .. }),
                    "{} -> {} should be rejected",
                    from,
                    to
                );
                assert_eq!(store.get(&job.id).unwrap().status, from);
            }
        }
    }

    #[test]
    fn test_generation_id_must_be_unique() {
        let store = store();
        let a = store.create(new_job("fp-a")).unwrap();
        let b = store.create(new_job("fp-b")).unwrap();
        store
            .update_status(&a.id, JobStatus::Processing, JobUpdate::default().generation_id("gen"))
            .unwrap();

        let err = store
            .update_status(&b.id, JobStatus::Processing, JobUpdate::default().generation_id("gen"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateIdentifier {
                field: "generation_id",
                ..
            }
        ));
        assert_eq!(store.get(&b.id).unwrap().status, JobStatus::Queued);
        assert_eq!(store.find_by_generation_id("gen").unwrap().unwrap().id, a.id);
    }

    #[test]
    fn test_create_unless_duplicate_returns_existing() {
        let store = store();
        let first = match store.create_unless_duplicate(new_job("same")).unwrap() {
            CreateOutcome::Created(job) => job,
            other => panic!("expected creation, got {:?}", other),
        };

        match store.create_unless_duplicate(new_job("same")).unwrap() {
            CreateOutcome::Existing(job) => assert_eq!(job.id, first.id),
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_jobs_are_not_duplicates() {
        let store = store();
        let first = store.create(new_job("same")).unwrap();
        store
            .update_status(&first.id, JobStatus::Failed, JobUpdate::default().error_message("boom"))
            .unwrap();

        assert!(store.find_duplicate("same").unwrap().is_none());
        assert_eq!(store.find_by_fingerprint("same").unwrap().unwrap().id, first.id);
        assert!(matches!(
            store.create_unless_duplicate(new_job("same")).unwrap(),
            CreateOutcome::Created(_)
        ));
    }

    #[test]
    fn test_failure_kind_is_stored_apart_from_message() {
        let store = store();
        let job = store.create(new_job("fp-1")).unwrap();
        let failure = GenerationFailure::new(GenerationErrorKind::QuotaExceeded, "Retry: tomorrow");

        store
            .update_status(&job.id, JobStatus::Failed, JobUpdate::default().failure(&failure))
            .unwrap();

        let loaded = store.get(&job.id).unwrap();
        assert_eq!(loaded.error_kind, Some(GenerationErrorKind::QuotaExceeded));
        assert_eq!(loaded.error_message.as_deref(), Some("Retry: tomorrow"));
        assert_eq!(loaded.failure(), Some(failure));
    }

    #[test]
    fn test_unknown_error_kind_is_invalid_data() {
        let store = store();
        let job = store.create(new_job("fp-1")).unwrap();
        store
            .db
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE jobs SET status = 'failed', error_kind = 'Meltdown' WHERE id = ?1",
                    [&job.id],
                )?;
                Ok(())
            })
            .unwrap();

        assert!(matches!(
            store.get(&job.id),
            Err(StoreError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_forced_jobs_bypass_and_join_duplicate_lookup() {
        let store = store();
        let first = store.create(new_job("same")).unwrap();

        let mut forced = new_job("same");
        forced.forced = true;
        let forced = match store.create_unless_duplicate(forced).unwrap() {
            CreateOutcome::Created(job) => job,
            other => panic!("expected creation, got {:?}", other),
        };
        assert_ne!(forced.id, first.id);
        assert!(forced.forced);

        match store.create_unless_duplicate(new_job("same")).unwrap() {
            CreateOutcome::Existing(job) => assert_eq!(job.id, forced.id),
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[test]
    fn test_unforced_in_flight_fingerprint_is_unique() {
        let store = store();
        store.create(new_job("same")).unwrap();
        let err = store.create(new_job("same")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateIdentifier {
                field: "fingerprint",
                ..
            }
        ));
    }

    #[test]
    fn test_list_is_newest_first_and_filtered() {
        let store = store();
        let mut ids = Vec::new();
        for i in 0..(PAGE_SIZE + 7) {
            let mut job = new_job(&format!("fp-{}", i));
            if i % 2 == 0 {
                job.provider = "minimax".to_string();
            }
            ids.push(store.create(job).unwrap().id);
        }

        let all: Vec<Job> = store.list(JobQuery::new()).collect::<Result<_, _>>().unwrap();
        assert_eq!(all.len(), PAGE_SIZE + 7);
        let expected: Vec<String> = ids.iter().rev().cloned().collect();
        assert_eq!(all.iter().map(|j| j.id.clone()).collect::<Vec<_>>(), expected);

        let limited: Vec<Job> = store
            .list(JobQuery::new().provider("MiniMax").limit(3))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(limited.len(), 3);
        assert!(limited.iter().all(|j| j.provider == "minimax"));
        assert_eq!(limited[0].id, ids[PAGE_SIZE + 6]);
    }

    #[test]
    fn test_list_pending() {
        let store = store();
        let queued = store.create(new_job("a")).unwrap();
        let processing = store.create(new_job("b")).unwrap();
        store
            .update_status(&processing.id, JobStatus::Processing, JobUpdate::default())
            .unwrap();
        let failed = store.create(new_job("c")).unwrap();
        store
            .update_status(&failed.id, JobStatus::Failed, JobUpdate::default())
            .unwrap();

        let pending: Vec<String> = store
            .list(JobQuery::pending())
            .map(|j| j.unwrap().id)
            .collect();
        assert_eq!(pending, vec![processing.id, queued.id]);
    }

    #[test]
    fn test_stats() {
        let store = store();
        let a = store.create(new_job("a")).unwrap();
        let mut minimax = new_job("b");
        minimax.provider = "minimax".to_string();
        store.create(minimax).unwrap();
        let mut veo = NewJob::new("veo", ContentType::Video, "c", "sunset");
        veo.metadata = json!({});
        let veo = store.create(veo).unwrap();
        store
            .update_status(&veo.id, JobStatus::Failed, JobUpdate::default())
            .unwrap();
        store
            .update_status(&a.id, JobStatus::Processing, JobUpdate::default())
            .unwrap();

        let stats = store.stats(&BTreeMap::new()).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status[&JobStatus::Queued], 1);
        assert_eq!(stats.by_status[&JobStatus::Processing], 1);
        assert_eq!(stats.by_status[&JobStatus::Failed], 1);
        assert_eq!(stats.by_status[&JobStatus::Downloaded], 0);
        assert_eq!(stats.by_provider["lyria"], 1);
        assert_eq!(stats.by_content_type[&ContentType::Music], 2);
        assert_eq!(stats.by_content_type[&ContentType::Image], 0);
        assert_eq!(stats.recent_24h, 3);
        assert_eq!(stats.estimated_cost, None);

        let costs: BTreeMap<String, f64> = [
            ("minimax".to_string(), 0.5),
            ("veo".to_string(), 10.0),
        ]
        .into_iter()
        .collect();
        let stats = store.stats(&costs).unwrap();
        assert_eq!(stats.estimated_cost, Some(0.5));
    }
}
