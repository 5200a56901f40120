//! Job Tracker: the entry point that wraps every provider call with
//! duplicate detection and job lifecycle bookkeeping.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::provider::request::params;
use crate::provider::{
    Completion, GenerationErrorKind, GenerationFailure, GenerationProvider, GenerationRequest,
    GenerationResult, ProviderRegistry,
};

use super::fingerprint::{fingerprint, normalize_token};
use super::model::{ContentType, Job, JobStatus, JobUpdate, NewJob};
use super::store::{CreateOutcome, JobIter, JobQuery, JobStats, JobStore, StoreError};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No {content_type} provider named '{name}' (available: {})", .available.join(", "))]
    UnknownProvider {
        content_type: ContentType,
        name: String,
        available: Vec<String>,
    },

    #[error("Job {job_id} is {status}, not completed")]
    NotReady { job_id: String, status: JobStatus },

    #[error("Job {0} has no generation id")]
    MissingGenerationId(String),

    #[error("Status query for job {job_id} failed: {failure}")]
    StatusQuery {
        job_id: String,
        failure: GenerationFailure,
    },

    #[error("Download for job {job_id} failed: {failure}")]
    Download {
        job_id: String,
        failure: GenerationFailure,
    },
}

impl TrackerError {
    /// Job store faults; these indicate a logic error and are never retried.
    pub fn is_integrity(&self) -> bool {
        matches!(self, TrackerError::Store(_))
    }
}

/// Runtime knobs for [`JobTracker`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    /// Upper bound for each provider call.
    pub provider_timeout: Duration,
    /// Root of the default download locations.
    pub output_dir: PathBuf,
    /// Cost per job, keyed by provider name.
    pub unit_costs: BTreeMap<String, f64>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(300),
            output_dir: PathBuf::from("output"),
            unit_costs: BTreeMap::new(),
        }
    }
}

/// Result of [`JobTracker::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A new job was created and dispatched.
    Created { job: Job, result: GenerationResult },
    /// An equivalent job already exists; the provider was not called.
    Duplicate { job: Job },
}

impl SubmitOutcome {
    pub fn job(&self) -> &Job {
        match self {
            SubmitOutcome::Created { job, .. } | SubmitOutcome::Duplicate { job } => job,
        }
    }

    pub fn into_job(self) -> Job {
        match self {
            SubmitOutcome::Created { job, .. } | SubmitOutcome::Duplicate { job } => job,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, SubmitOutcome::Duplicate { .. })
    }

    /// The provider's envelope; `None` for duplicates.
    pub fn result(&self) -> Option<&GenerationResult> {
        match self {
            SubmitOutcome::Created { result, .. } => Some(result),
            SubmitOutcome::Duplicate { .. } => None,
        }
    }
}

impl fmt::Display for SubmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitOutcome::Duplicate { job } => write!(
                f,
                "Duplicate of job {} ({}); submit with force to generate again",
                job.id, job.status
            ),
            SubmitOutcome::Created {
                job,
                result: GenerationResult::Failure(failure),
            } => write!(f, "Job {} {}: {}", job.id, job.status, failure),
            SubmitOutcome::Created { job, .. } => match job.output_path {
                Some(ref path) => write!(f, "Job {} {} -> {}", job.id, job.status, path),
                None => write!(f, "Job {} {}", job.id, job.status),
            },
        }
    }
}

/// One job visited by [`JobTracker::sync`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub job: Job,
    pub previous: JobStatus,
}

impl SyncOutcome {
    pub fn changed(&self) -> bool {
        self.job.status != self.previous
    }
}

/// Result of [`JobTracker::sync_all`]. Failures are collected per job.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<SyncOutcome>,
    pub errors: Vec<(String, TrackerError)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.outcomes.iter().filter(|o| o.job.status == status).count()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Synced {} job(s): {} completed, {} downloaded, {} failed, {} still processing",
            self.outcomes.len() + self.errors.len(),
            self.count(JobStatus::Completed),
            self.count(JobStatus::Downloaded),
            self.count(JobStatus::Failed),
            self.count(JobStatus::Processing),
        )?;
        for (job_id, err) in &self.errors {
            write!(f, "\n  {}: {}", job_id, err)?;
        }
        Ok(())
    }
}

/// Coordinates fingerprinting, duplicate lookup, provider dispatch and
/// status bookkeeping. Constructed once by the process entry point.
pub struct JobTracker {
    store: JobStore,
    providers: ProviderRegistry,
    settings: TrackerSettings,
}

impl JobTracker {
    pub fn new(store: JobStore, providers: ProviderRegistry, settings: TrackerSettings) -> Self {
        Self {
            store,
            providers,
            settings,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Submits a request unless an equivalent non-failed job exists.
    ///
    /// The duplicate lookup and job creation happen before the provider
    /// is contacted; a duplicate returns the existing job untouched.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        force: bool,
    ) -> Result<SubmitOutcome, TrackerError> {
        let provider = self.provider_for(request.content_type, &request.provider)?;

        let mut new_job = NewJob::new(
            normalize_token(&request.provider),
            request.content_type,
            fingerprint(request).into_string(),
            request.prompt.trim(),
        );
        new_job.command = Some(request.command_line());
        new_job.forced = force;
        new_job.metadata = request.params_json();

        let job = match self.store.create_unless_duplicate(new_job)? {
            CreateOutcome::Existing(job) => {
                info!(job_id = %job.id, status = %job.status, "Duplicate request, reusing job");
                return Ok(SubmitOutcome::Duplicate { job });
            }
            CreateOutcome::Created(job) => job,
        };
        info!(
            job_id = %job.id,
            provider = %job.provider,
            content_type = %job.content_type,
            forced = force,
            "Job created"
        );

        warn_unsupported(provider.as_ref(), request);

        let result = self.bounded("generate", provider.generate(request)).await;
        let job = self.record_dispatch(job, &result)?;

        match result {
            GenerationResult::Failure(ref failure) => {
                warn!(job_id = %job.id, status = %job.status, error = %failure, "Generation failed")
            }
            GenerationResult::Success(_) => {
                info!(job_id = %job.id, status = %job.status, "Generation dispatched")
            }
        }

        Ok(SubmitOutcome::Created { job, result })
    }

    /// Polls the provider for a `processing` job and records the answer.
    ///
    /// A `queued` job the provider never acknowledged is failed with
    /// `Timeout` once it is older than the provider timeout, which releases
    /// its fingerprint. Jobs in any other status are returned unchanged.
    /// Transient query failures leave the job `processing` and are returned
    /// as errors.
    pub async fn sync(&self, job_id: &str) -> Result<SyncOutcome, TrackerError> {
        let job = self.store.get(job_id)?;
        let previous = job.status;
        if previous == JobStatus::Queued {
            let job = self.expire_unacknowledged(job)?;
            return Ok(SyncOutcome { job, previous });
        }
        if previous != JobStatus::Processing {
            return Ok(SyncOutcome { job, previous });
        }

        let generation_id = job
            .generation_id
            .clone()
            .ok_or_else(|| TrackerError::MissingGenerationId(job.id.clone()))?;
        let provider = self.provider_for(job.content_type, &job.provider)?;
        if !provider.capabilities().supports_status {
            return Err(TrackerError::StatusQuery {
                job_id: job.id.clone(),
                failure: GenerationFailure::new(
                    GenerationErrorKind::InvalidInput,
                    format!("Provider '{}' does not support status checks", job.provider),
                )
                .with_generation_id(generation_id),
            });
        }

        let result = self
            .bounded("check_status", provider.check_status(&generation_id))
            .await;
        let job = match result {
            GenerationResult::Success(output) => match output.completion {
                Completion::Pending => job,
                Completion::Ready => self.record_ready(job, output.file_path.as_deref())?,
            },
            GenerationResult::Failure(failure) if failure.kind.is_transient() => {
                return Err(TrackerError::StatusQuery {
                    job_id: job.id,
                    failure,
                });
            }
            GenerationResult::Failure(failure) => self.store.update_status(
                &job.id,
                JobStatus::Failed,
                JobUpdate::default().failure(&failure),
            )?,
        };

        debug!(job_id = %job.id, from = %previous, to = %job.status, "Job synced");
        Ok(SyncOutcome { job, previous })
    }

    /// Syncs every `queued` and `processing` job, optionally downloading the
    /// ones that completed. One job's failure never stops the others.
    pub async fn sync_all(&self, download: bool) -> Result<SyncReport, TrackerError> {
        let pending = self
            .store
            .list(JobQuery::pending())
            .collect::<Result<Vec<Job>, StoreError>>()?;

        let mut report = SyncReport::default();
        for job in pending {
            match self.sync(&job.id).await {
                Ok(mut outcome) => {
                    if download && outcome.job.status == JobStatus::Completed {
                        match self.download(&job.id, None).await {
                            Ok(downloaded) => outcome.job = downloaded,
                            Err(e) => report.errors.push((job.id.clone(), e)),
                        }
                    }
                    report.outcomes.push(outcome);
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Sync failed");
                    report.errors.push((job.id, e));
                }
            }
        }

        info!(
            synced = report.outcomes.len(),
            errors = report.errors.len(),
            "Sync finished"
        );
        Ok(report)
    }

    /// Retrieves the artifact of a `completed` job and marks it
    /// `downloaded`. Without `output_path` the default location is used.
    ///
    /// A job that is already `downloaded` is returned unchanged instead of
    /// failing with `NotReady`, so repeating a download never calls the
    /// provider twice.
    pub async fn download(
        &self,
        job_id: &str,
        output_path: Option<&Path>,
    ) -> Result<Job, TrackerError> {
        let job = self.store.get(job_id)?;
        match job.status {
            JobStatus::Completed => {}
            JobStatus::Downloaded => return Ok(job),
            status => {
                return Err(TrackerError::NotReady {
                    job_id: job.id,
                    status,
                })
            }
        }

        let generation_id = job
            .generation_id
            .clone()
            .ok_or_else(|| TrackerError::MissingGenerationId(job.id.clone()))?;
        let provider = self.provider_for(job.content_type, &job.provider)?;
        let target = output_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_output_path(&job));

        let downloaded = tokio::time::timeout(
            self.settings.provider_timeout,
            provider.download(&generation_id, &target),
        )
        .await;
        let path = match downloaded {
            Ok(Ok(path)) => path,
            Ok(Err(failure)) => {
                return Err(TrackerError::Download {
                    job_id: job.id,
                    failure,
                })
            }
            Err(_) => {
                return Err(TrackerError::Download {
                    job_id: job.id,
                    failure: self.timeout_failure("download").with_generation_id(generation_id),
                })
            }
        };

        let job = self.store.update_status(
            &job.id,
            JobStatus::Downloaded,
            JobUpdate::default().output_path(path.display().to_string()),
        )?;
        info!(job_id = %job.id, path = %path.display(), "Artifact downloaded");
        Ok(job)
    }

    pub fn get(&self, job_id: &str) -> Result<Job, TrackerError> {
        Ok(self.store.get(job_id)?)
    }

    pub fn list(&self, query: JobQuery) -> JobIter {
        self.store.list(query)
    }

    /// Queued and processing jobs, newest first.
    pub fn pending(&self) -> Result<Vec<Job>, TrackerError> {
        Ok(self
            .store
            .list(JobQuery::pending())
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub fn stats(&self) -> Result<JobStats, TrackerError> {
        Ok(self.store.stats(&self.settings.unit_costs)?)
    }

    /// `<output_dir>/<content_type>/job_<short id>.<ext>`
    pub fn default_output_path(&self, job: &Job) -> PathBuf {
        self.settings
            .output_dir
            .join(job.content_type.as_str())
            .join(format!(
                "job_{}.{}",
                job.short_id(),
                job.content_type.default_extension()
            ))
    }

    pub(crate) fn provider_for(
        &self,
        content_type: ContentType,
        name: &str,
    ) -> Result<Arc<dyn GenerationProvider>, TrackerError> {
        self.providers
            .get(content_type, name)
            .ok_or_else(|| TrackerError::UnknownProvider {
                content_type,
                name: name.to_string(),
                available: self.providers.names(content_type),
            })
    }

    /// Applies the dispatch envelope to a freshly created job.
    fn record_dispatch(&self, job: Job, result: &GenerationResult) -> Result<Job, TrackerError> {
        match result {
            GenerationResult::Success(output) => {
                let mut update = JobUpdate::default();
                if let Some(ref generation_id) = output.generation_id {
                    update = update.generation_id(generation_id.clone());
                }
                let job = self
                    .store
                    .update_status(&job.id, JobStatus::Processing, update)?;
                match output.completion {
                    Completion::Pending => Ok(job),
                    Completion::Ready => self.record_ready(job, output.file_path.as_deref()),
                }
            }
            GenerationResult::Failure(failure) if failure.kind == GenerationErrorKind::Timeout => {
                // The remote side may still be working; keep the job for a later sync.
                match failure.generation_id {
                    Some(ref generation_id) => Ok(self.store.update_status(
                        &job.id,
                        JobStatus::Processing,
                        JobUpdate::default().generation_id(generation_id.clone()),
                    )?),
                    None => Ok(job),
                }
            }
            GenerationResult::Failure(failure) => {
                let mut update = JobUpdate::default().failure(failure);
                if let Some(ref generation_id) = failure.generation_id {
                    update = update.generation_id(generation_id.clone());
                }
                Ok(self.store.update_status(&job.id, JobStatus::Failed, update)?)
            }
        }
    }

    /// Fails a `queued` job without a generation id whose dispatch window
    /// has passed.
    fn expire_unacknowledged(&self, job: Job) -> Result<Job, TrackerError> {
        let age = Utc::now()
            .signed_duration_since(job.created_at)
            .to_std()
            .unwrap_or_default();
        if job.generation_id.is_some() || age < self.settings.provider_timeout {
            return Ok(job);
        }

        let failure = GenerationFailure::new(
            GenerationErrorKind::Timeout,
            format!(
                "Provider did not accept the job within {:?}",
                self.settings.provider_timeout
            ),
        );
        let job = self
            .store
            .update_status(&job.id, JobStatus::Failed, JobUpdate::default().failure(&failure))?;
        warn!(job_id = %job.id, "Queued job expired without a generation id");
        Ok(job)
    }

    /// `processing → completed`, then `→ downloaded` if the artifact is local.
    fn record_ready(&self, job: Job, file_path: Option<&Path>) -> Result<Job, TrackerError> {
        let job = self
            .store
            .update_status(&job.id, JobStatus::Completed, JobUpdate::default())?;
        match file_path {
            Some(path) => Ok(self.store.update_status(
                &job.id,
                JobStatus::Downloaded,
                JobUpdate::default().output_path(path.display().to_string()),
            )?),
            None => Ok(job),
        }
    }

    /// Runs a provider call under the configured timeout.
    async fn bounded<F>(&self, operation: &str, call: F) -> GenerationResult
    where
        F: Future<Output = GenerationResult>,
    {
        match tokio::time::timeout(self.settings.provider_timeout, call).await {
            Ok(result) => result,
            Err(_) => self.timeout_failure(operation).into(),
        }
    }

    fn timeout_failure(&self, operation: &str) -> GenerationFailure {
        GenerationFailure::new(
            GenerationErrorKind::Timeout,
            format!(
                "{} did not finish within {:?}",
                operation, self.settings.provider_timeout
            ),
        )
    }
}

fn warn_unsupported(provider: &dyn GenerationProvider, request: &GenerationRequest) {
    let capabilities = provider.capabilities();
    if request.has_param(params::REFERENCE_AUDIO_URL) && !capabilities.supports_reference_audio {
        warn!(
            provider = provider.name(),
            "Provider ignores reference audio; generating from the prompt only"
        );
    }
    if request.has_param(params::LYRICS) && !capabilities.supports_vocals {
        warn!(
            provider = provider.name(),
            "Provider does not sing lyrics; generating instrumental"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::provider::{ProviderCapabilities, ScriptedProvider};

    fn tracker_with(provider: ScriptedProvider) -> (JobTracker, Arc<ScriptedProvider>) {
        tracker_with_timeout(provider, Duration::from_millis(200))
    }

    fn tracker_with_timeout(
        provider: ScriptedProvider,
        provider_timeout: Duration,
    ) -> (JobTracker, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let registry = ProviderRegistry::new().with(provider.clone());
        let tracker = JobTracker::new(
            JobStore::new(Database::open_in_memory().unwrap()),
            registry,
            TrackerSettings {
                provider_timeout,
                ..TrackerSettings::default()
            },
        );
        (tracker, provider)
    }

    fn jazz() -> GenerationRequest {
        GenerationRequest::music("lyria", "Smooth jazz").param(params::BPM, 95)
    }

    #[tokio::test]
    async fn test_submit_async_provider_moves_to_processing() {
        let (tracker, provider) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music)
                .then_generate(GenerationResult::pending("gen-1")),
        );

        let outcome = tracker.submit(&jazz(), false).await.unwrap();
        assert!(!outcome.is_duplicate());
        let job = outcome.job();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.generation_id.as_deref(), Some("gen-1"));
        assert_eq!(
            job.command.as_deref(),
            Some("ai-content music --prompt 'Smooth jazz' --provider lyria --bpm 95")
        );
        assert_eq!(job.metadata, serde_json::json!({"bpm": 95}));
        assert_eq!(provider.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_submit_skips_provider() {
        let (tracker, provider) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music)
                .with_generate_fallback(GenerationResult::pending("unused"))
                .then_generate(GenerationResult::pending("gen-1")),
        );

        let first = tracker.submit(&jazz(), false).await.unwrap().into_job();
        let second = tracker
            .submit(&GenerationRequest::music("LYRIA", " Smooth   jazz ").param(params::BPM, 95.0), false)
            .await
            .unwrap();

        assert!(second.is_duplicate());
        assert_eq!(second.job().id, first.id);
        assert_eq!(second.job().status, JobStatus::Processing);
        assert_eq!(provider.generate_calls(), 1);
        assert!(second.to_string().contains(&first.id));
        assert!(second.to_string().contains("processing"));
    }

    #[tokio::test]
    async fn test_synchronous_success_with_file_is_downloaded() {
        let (tracker, _) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music)
                .then_generate(GenerationResult::ready("/tmp/jazz.wav")),
        );

        let job = tracker.submit(&jazz(), false).await.unwrap().into_job();
        assert_eq!(job.status, JobStatus::Downloaded);
        assert_eq!(job.output_path.as_deref(), Some("/tmp/jazz.wav"));
    }

    #[tokio::test]
    async fn test_provider_failure_marks_job_failed() {
        let (tracker, _) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music).then_generate(
                GenerationResult::failure(GenerationErrorKind::QuotaExceeded, "daily limit"),
            ),
        );

        let outcome = tracker.submit(&jazz(), false).await.unwrap();
        assert_eq!(outcome.job().status, JobStatus::Failed);
        assert_eq!(outcome.job().error_kind, Some(GenerationErrorKind::QuotaExceeded));
        assert_eq!(outcome.job().error_message.as_deref(), Some("daily limit"));
        assert!(outcome.to_string().contains("QuotaExceeded"));
    }

    #[tokio::test]
    async fn test_dispatch_timeout_leaves_job_queued() {
        let (tracker, _) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music)
                .with_delay(Duration::from_secs(5))
                .then_generate(GenerationResult::pending("late")),
        );

        let outcome = tracker.submit(&jazz(), false).await.unwrap();
        assert_eq!(outcome.job().status, JobStatus::Queued);
        assert_eq!(
            outcome.result().and_then(|r| r.failure_ref()).map(|f| f.kind),
            Some(GenerationErrorKind::Timeout)
        );
    }

    #[tokio::test]
    async fn test_sync_all_expires_unacknowledged_queued_job() {
        let (tracker, provider) = tracker_with_timeout(
            ScriptedProvider::new("lyria", ContentType::Music)
                .with_delay(Duration::from_millis(100))
                .with_generate_fallback(GenerationResult::pending("late")),
            Duration::from_millis(20),
        );

        let first = tracker.submit(&jazz(), false).await.unwrap().into_job();
        assert_eq!(first.status, JobStatus::Queued);

        // Still queued, so an identical request is a duplicate.
        assert!(tracker.submit(&jazz(), false).await.unwrap().is_duplicate());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let report = tracker.sync_all(false).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.count(JobStatus::Failed), 1);

        let expired = tracker.get(&first.id).unwrap();
        assert_eq!(expired.status, JobStatus::Failed);
        assert_eq!(expired.error_kind, Some(GenerationErrorKind::Timeout));
        assert_eq!(provider.status_calls(), 0);

        let retry = tracker.submit(&jazz(), false).await.unwrap();
        assert!(!retry.is_duplicate());
        assert_ne!(retry.job().id, first.id);
    }

    #[tokio::test]
    async fn test_sync_leaves_fresh_queued_job_alone() {
        let (tracker, _) = tracker_with(ScriptedProvider::new("lyria", ContentType::Music));
        let job = tracker
            .store()
            .create(NewJob::new("lyria", ContentType::Music, "fp-1", "Smooth jazz"))
            .unwrap();

        let outcome = tracker.sync(&job.id).await.unwrap();

        assert!(!outcome.changed());
        assert_eq!(outcome.job.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_unknown_provider_lists_available() {
        let (tracker, provider) =
            tracker_with(ScriptedProvider::new("lyria", ContentType::Music));
        let err = tracker
            .submit(&GenerationRequest::music("suno", "jazz"), false)
            .await
            .unwrap_err();

        assert!(!err.is_integrity());
        assert_eq!(
            err.to_string(),
            "No music provider named 'suno' (available: lyria)"
        );
        assert_eq!(provider.generate_calls(), 0);
        assert!(tracker.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_walks_processing_job_to_completed() {
        let (tracker, _) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music)
                .then_generate(GenerationResult::pending("gen-1"))
                .then_status("gen-1", GenerationResult::pending("gen-1"))
                .then_status("gen-1", GenerationResult::ready_remote("gen-1")),
        );
        let job = tracker.submit(&jazz(), false).await.unwrap().into_job();

        let first = tracker.sync(&job.id).await.unwrap();
        assert!(!first.changed());
        let second = tracker.sync(&job.id).await.unwrap();
        assert!(second.changed());
        assert_eq!(second.job.status, JobStatus::Completed);

        // Completed jobs are left alone.
        let third = tracker.sync(&job.id).await.unwrap();
        assert_eq!(third.job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_sync_transient_failure_keeps_processing() {
        let (tracker, _) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music)
                .then_generate(GenerationResult::pending("gen-1"))
                .then_status(
                    "gen-1",
                    GenerationResult::failure(GenerationErrorKind::Unknown, "502"),
                )
                .then_status(
                    "gen-1",
                    GenerationResult::failure(GenerationErrorKind::ProviderRejected, "nsfw"),
                ),
        );
        let job = tracker.submit(&jazz(), false).await.unwrap().into_job();

        let err = tracker.sync(&job.id).await.unwrap_err();
        assert!(matches!(err, TrackerError::StatusQuery { .. }));
        assert_eq!(tracker.get(&job.id).unwrap().status, JobStatus::Processing);

        let outcome = tracker.sync(&job.id).await.unwrap();
        assert_eq!(outcome.job.status, JobStatus::Failed);
        assert_eq!(outcome.job.error_kind, Some(GenerationErrorKind::ProviderRejected));
        assert_eq!(outcome.job.error_message.as_deref(), Some("nsfw"));
    }

    #[tokio::test]
    async fn test_sync_requires_status_support() {
        let (tracker, provider) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music)
                .with_capabilities(ProviderCapabilities::default())
                .then_generate(GenerationResult::pending("gen-1")),
        );
        let job = tracker.submit(&jazz(), false).await.unwrap().into_job();

        let err = tracker.sync(&job.id).await.unwrap_err();
        assert!(err.to_string().contains("does not support status checks"));
        assert_eq!(provider.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_download_requires_completed() {
        let dir = tempfile::tempdir().unwrap();
        let (tracker, _) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music)
                .with_download_payload("mp3 bytes")
                .then_generate(GenerationResult::pending("gen-1"))
                .then_status("gen-1", GenerationResult::ready_remote("gen-1")),
        );
        let job = tracker.submit(&jazz(), false).await.unwrap().into_job();

        let err = tracker.download(&job.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::NotReady {
                status: JobStatus::Processing,
                ..
            }
        ));

        tracker.sync(&job.id).await.unwrap();
        let target = dir.path().join("jazz.mp3");
        let job = tracker.download(&job.id, Some(&target)).await.unwrap();
        assert_eq!(job.status, JobStatus::Downloaded);
        assert_eq!(job.output_path, Some(target.display().to_string()));
        assert_eq!(std::fs::read(&target).unwrap(), b"mp3 bytes");
    }

    #[tokio::test]
    async fn test_download_of_downloaded_job_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (tracker, provider) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music)
                .with_download_payload("mp3 bytes")
                .then_generate(GenerationResult::pending("gen-1"))
                .then_status("gen-1", GenerationResult::ready_remote("gen-1")),
        );
        let job = tracker.submit(&jazz(), false).await.unwrap().into_job();
        tracker.sync(&job.id).await.unwrap();
        let target = dir.path().join("jazz.mp3");
        let first = tracker.download(&job.id, Some(&target)).await.unwrap();

        let again = tracker
            .download(&job.id, Some(&dir.path().join("elsewhere.mp3")))
            .await
            .unwrap();

        assert_eq!(again, first);
        assert_eq!(provider.download_calls(), 1);
        assert!(!dir.path().join("elsewhere.mp3").exists());
    }

    #[tokio::test]
    async fn test_default_output_path() {
        let (tracker, _) = tracker_with(
            ScriptedProvider::new("lyria", ContentType::Music)
                .then_generate(GenerationResult::pending("gen-1")),
        );
        let job = tracker.submit(&jazz(), false).await.unwrap().into_job();
        let path = tracker.default_output_path(&job);
        assert_eq!(
            path,
            PathBuf::from("output")
                .join("music")
                .join(format!("job_{}.mp3", &job.id[..8]))
        );
    }

    #[tokio::test]
    async fn test_stats_use_configured_costs() {
        let provider = Arc::new(
            ScriptedProvider::new("minimax", ContentType::Music)
                .with_generate_fallback(GenerationResult::pending("x"))
                .then_generate(GenerationResult::pending("gen-1")),
        );
        let tracker = JobTracker::new(
            JobStore::new(Database::open_in_memory().unwrap()),
            ProviderRegistry::new().with(provider),
            TrackerSettings {
                unit_costs: [("minimax".to_string(), 0.25)].into_iter().collect(),
                ..TrackerSettings::default()
            },
        );
        tracker
            .submit(&GenerationRequest::music("minimax", "jazz"), false)
            .await
            .unwrap();

        let stats = tracker.stats().unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.estimated_cost, Some(0.25));
    }
}
