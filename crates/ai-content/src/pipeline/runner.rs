use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::jobs::{Job, JobStatus, JobTracker, SubmitOutcome, TrackerError};
use crate::provider::{
    GenerationErrorKind, GenerationFailure, GenerationRequest, GenerationResult,
};

use super::config::PipelineSettings;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::media::{MediaMerger, NoMerger, NoUploader, Uploader};
use super::progress::{NoopProgress, ProgressEvent, ProgressReporter};
use super::result::{PipelineResult, StageReport};
use super::stage::{Binding, PipelineDefinition, Stage, StageAction, StageGroup};

pub struct Pipeline {
    tracker: Arc<JobTracker>,
    merger: Arc<dyn MediaMerger>,
    uploader: Arc<dyn Uploader>,
    settings: PipelineSettings,
    progress: Arc<dyn ProgressReporter>,
}

impl Pipeline {
    /// A pipeline without merge or upload services; those stages fail.
    pub fn new(tracker: Arc<JobTracker>) -> Self {
        Self {
            tracker,
            merger: Arc::new(NoMerger),
            uploader: Arc::new(NoUploader),
            settings: PipelineSettings::default(),
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_merger(mut self, merger: Arc<dyn MediaMerger>) -> Self {
        self.merger = merger;
        self
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = uploader;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Runs every group in order and aggregates the stage envelopes.
    ///
    /// Stage failures are reported in the result. Only job store faults
    /// and invalid definitions return `Err`.
    pub async fn run(
        &self,
        definition: &PipelineDefinition,
        force: bool,
    ) -> Result<PipelineResult, PipelineError> {
        definition.validate()?;
        let span = info_span!("pipeline", name = %definition.name, force);
        self.run_groups(definition, force).instrument(span).await
    }

    async fn run_groups(
        &self,
        definition: &PipelineDefinition,
        force: bool,
    ) -> Result<PipelineResult, PipelineError> {
        self.progress.report(ProgressEvent::Started {
            pipeline: definition.name.clone(),
            stages: definition.stages().count(),
        });

        let mut ctx = PipelineContext::new();
        for group in &definition.groups {
            match group {
                StageGroup::Sequential(stage) => {
                    let report = self.run_stage(stage, &ctx, force).await?;
                    ctx.record(report);
                }
                StageGroup::Parallel(stages) => {
                    let settled =
                        join_all(stages.iter().map(|stage| self.run_stage(stage, &ctx, force)))
                            .await;
                    // Siblings always settle before a store fault aborts the run.
                    let reports = settled.into_iter().collect::<Result<Vec<_>, _>>()?;
                    for report in reports {
                        ctx.record(report);
                    }
                }
            }
        }

        let result = PipelineResult::new(definition.name.clone(), ctx.into_reports());
        info!(
            success = result.success,
            outputs = result.output_paths.len(),
            "Pipeline finished"
        );
        self.progress.report(ProgressEvent::Finished {
            pipeline: result.pipeline.clone(),
            success: result.success,
        });
        Ok(result)
    }

    async fn run_stage(
        &self,
        stage: &Stage,
        ctx: &PipelineContext,
        force: bool,
    ) -> Result<StageReport, PipelineError> {
        let span = info_span!("stage", stage = %stage.name, required = stage.required);
        async {
            if let Some(reason) = ctx.blocked_by(stage) {
                info!(%reason, "Stage skipped");
                self.progress.report(ProgressEvent::StageSkipped {
                    stage: stage.name.clone(),
                    reason: reason.clone(),
                });
                return Ok(StageReport::skipped(&stage.name, stage.required, reason));
            }

            self.progress.report(ProgressEvent::StageStarted {
                stage: stage.name.clone(),
            });

            let report = match stage.action {
                StageAction::Generate {
                    ref request,
                    ref bindings,
                } => self.run_generation(stage, request, bindings, ctx, force).await?,
                StageAction::Merge {
                    ref audio_stage,
                    ref video_stage,
                    ref output,
                } => {
                    let result = match (ctx.output_path(audio_stage), ctx.output_path(video_stage)) {
                        (Some(audio), Some(video)) => {
                            self.bounded("merge", self.merger.merge(audio, video, output))
                                .await
                        }
                        _ => GenerationResult::failure(
                            GenerationErrorKind::InvalidInput,
                            "Merge inputs have no local artifact",
                        ),
                    };
                    StageReport::finished(&stage.name, stage.required, result)
                }
                StageAction::Upload {
                    ref source_stage,
                    ref destination,
                } => {
                    let result = match ctx.output_path(source_stage) {
                        Some(source) => {
                            self.bounded("upload", self.uploader.upload(source, destination))
                                .await
                        }
                        None => GenerationResult::failure(
                            GenerationErrorKind::InvalidInput,
                            format!("Stage '{}' has no local artifact to upload", source_stage),
                        ),
                    };
                    StageReport::finished(&stage.name, stage.required, result)
                }
            };

            self.report_settled(&report);
            Ok::<_, PipelineError>(report)
        }
        .instrument(span)
        .await
    }

    async fn run_generation(
        &self,
        stage: &Stage,
        request: &GenerationRequest,
        bindings: &[Binding],
        ctx: &PipelineContext,
        force: bool,
    ) -> Result<StageReport, PipelineError> {
        let mut request = request.clone();
        for binding in bindings {
            match ctx.output_path(&binding.from_stage) {
                Some(path) => {
                    request.params.insert(
                        binding.param.clone(),
                        Value::String(path.display().to_string()),
                    );
                }
                None => {
                    let failure = GenerationResult::failure(
                        GenerationErrorKind::InvalidInput,
                        format!(
                            "Stage '{}' has no local artifact for '{}'",
                            binding.from_stage, binding.param
                        ),
                    );
                    return Ok(StageReport::finished(&stage.name, stage.required, failure));
                }
            }
        }

        let outcome = match self.tracker.submit(&request, force).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_integrity() => return Err(e.into()),
            Err(e) => {
                let failure =
                    GenerationResult::failure(GenerationErrorKind::InvalidInput, e.to_string());
                return Ok(StageReport::finished(&stage.name, stage.required, failure));
            }
        };

        let duplicate = outcome.is_duplicate();
        let (job, dispatched) = match outcome {
            SubmitOutcome::Created { job, result } => (job, Some(result)),
            SubmitOutcome::Duplicate { job } => (job, None),
        };
        let job_id = job.id.clone();

        let result = match dispatched {
            Some(GenerationResult::Failure(failure)) => GenerationResult::Failure(failure),
            Some(GenerationResult::Success(output)) => self
                .settle(job, request.output_path.as_deref())
                .await?
                .with_metadata(output.raw_metadata),
            None => self.settle(job, request.output_path.as_deref()).await?,
        };

        let mut report = StageReport::finished(&stage.name, stage.required, result);
        report.job_id = Some(job_id);
        report.duplicate = duplicate;
        Ok(report)
    }

    /// Drives a job to a local artifact: polls while `queued` or
    /// `processing`, downloads once `completed`. A `queued` job usually
    /// belongs to a concurrent dispatch of the same request.
    async fn settle(
        &self,
        job: Job,
        output_path: Option<&Path>,
    ) -> Result<GenerationResult, PipelineError> {
        let started = Instant::now();
        let mut job = job;
        loop {
            match job.status {
                JobStatus::Downloaded => {
                    let result = match job.output_path {
                        Some(ref path) => GenerationResult::ready(path.clone()),
                        None => GenerationResult::failure(
                            GenerationErrorKind::Unknown,
                            format!("Job {} is downloaded but has no output path", job.id),
                        ),
                    };
                    return Ok(match job.generation_id {
                        Some(generation_id) => result.with_generation_id(generation_id),
                        None => result,
                    });
                }
                JobStatus::Completed => {
                    let downloaded = self.tracker.download(&job.id, output_path).await;
                    match downloaded {
                        Ok(next) => job = next,
                        Err(e) if e.is_integrity() => return Err(e.into()),
                        Err(TrackerError::Download { failure, .. }) => return Ok(failure.into()),
                        Err(e) => {
                            return Ok(GenerationResult::failure(
                                GenerationErrorKind::Unknown,
                                e.to_string(),
                            ))
                        }
                    }
                }
                JobStatus::Failed => {
                    let failure = job.failure().unwrap_or_else(|| {
                        GenerationFailure::new(GenerationErrorKind::Unknown, "Job failed")
                    });
                    return Ok(failure.into());
                }
                JobStatus::Queued | JobStatus::Processing => {
                    if started.elapsed() >= self.settings.max_wait {
                        let failure = GenerationFailure::new(
                            GenerationErrorKind::Timeout,
                            format!(
                                "Job {} still {} after {:?}; sync it later",
                                job.id, job.status, self.settings.max_wait
                            ),
                        );
                        return Ok(match job.generation_id {
                            Some(generation_id) => failure.with_generation_id(generation_id),
                            None => failure,
                        }
                        .into());
                    }

                    tokio::time::sleep(self.settings.poll_interval).await;
                    let synced = self.tracker.sync(&job.id).await;
                    match synced {
                        Ok(outcome) => job = outcome.job,
                        Err(e) if e.is_integrity() => return Err(e.into()),
                        Err(TrackerError::StatusQuery { failure, .. })
                            if failure.kind.is_transient() =>
                        {
                            debug!(job_id = %job.id, error = %failure, "Status check failed, retrying");
                        }
                        Err(TrackerError::StatusQuery { failure, .. }) => {
                            return Ok(failure.into())
                        }
                        Err(e) => {
                            return Ok(GenerationResult::failure(
                                GenerationErrorKind::InvalidInput,
                                e.to_string(),
                            ))
                        }
                    }
                }
            }
        }
    }

    /// Runs a merge or upload call under the provider timeout.
    async fn bounded<F>(&self, operation: &str, call: F) -> GenerationResult
    where
        F: Future<Output = GenerationResult>,
    {
        let timeout = self.tracker.settings().provider_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => GenerationResult::failure(
                GenerationErrorKind::Timeout,
                format!("{} did not finish within {:?}", operation, timeout),
            ),
        }
    }

    fn report_settled(&self, report: &StageReport) {
        match report.failure() {
            Some(failure) => {
                warn!(kind = %failure.kind, error = %failure.message, "Stage failed");
                self.progress.report(ProgressEvent::StageFailed {
                    stage: report.name.clone(),
                    kind: failure.kind,
                    message: failure.message.clone(),
                });
            }
            None => {
                info!(job_id = ?report.job_id, duplicate = report.duplicate, "Stage succeeded");
                self.progress.report(ProgressEvent::StageSucceeded {
                    stage: report.name.clone(),
                    job_id: report.job_id.clone(),
                    duplicate: report.duplicate,
                });
            }
        }
    }
}
