use std::fmt;
use std::path::{Path, PathBuf};

use crate::provider::{GenerationFailure, GenerationResult};

/// How a stage settled.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Finished(GenerationResult),
    /// Not attempted because a dependency did not succeed.
    Skipped { reason: String },
}

/// One stage's entry in a [`PipelineResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub name: String,
    pub required: bool,
    pub outcome: StageOutcome,
    /// Job backing a generation stage.
    pub job_id: Option<String>,
    /// The generation reused an existing job.
    pub duplicate: bool,
}

impl StageReport {
    pub fn finished(name: impl Into<String>, required: bool, result: GenerationResult) -> Self {
        Self {
            name: name.into(),
            required,
            outcome: StageOutcome::Finished(result),
            job_id: None,
            duplicate: false,
        }
    }

    pub fn skipped(name: impl Into<String>, required: bool, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required,
            outcome: StageOutcome::Skipped {
                reason: reason.into(),
            },
            job_id: None,
            duplicate: false,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, StageOutcome::Finished(ref r) if r.is_success())
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, StageOutcome::Skipped { .. })
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        match self.outcome {
            StageOutcome::Finished(ref result) => Some(result),
            StageOutcome::Skipped { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&GenerationFailure> {
        self.result().and_then(GenerationResult::failure_ref)
    }

    /// Local artifact of a successful stage.
    pub fn output_path(&self) -> Option<&Path> {
        self.result()
            .filter(|r| r.is_success())
            .and_then(GenerationResult::file_path)
            .map(PathBuf::as_path)
    }
}

/// Aggregated outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub pipeline: String,
    /// Stage reports in declaration order.
    pub stages: Vec<StageReport>,
    /// Every required stage succeeded.
    pub success: bool,
    /// Local artifacts produced by successful stages.
    pub output_paths: Vec<PathBuf>,
}

impl PipelineResult {
    pub fn new(pipeline: impl Into<String>, stages: Vec<StageReport>) -> Self {
        let success = stages.iter().filter(|s| s.required).all(StageReport::succeeded);
        let output_paths = stages
            .iter()
            .filter_map(|s| s.output_path().map(Path::to_path_buf))
            .collect();
        Self {
            pipeline: pipeline.into(),
            stages,
            success,
            output_paths,
        }
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn failed_stages(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|s| s.failure().is_some())
    }

    pub fn skipped_stages(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|s| s.is_skipped())
    }

    /// `(stage, url)` for every successful upload.
    pub fn uploaded_urls(&self) -> Vec<(&str, &str)> {
        self.stages
            .iter()
            .filter_map(|s| match s.result() {
                Some(GenerationResult::Success(output)) => output
                    .raw_metadata
                    .get("url")
                    .and_then(|u| u.as_str())
                    .map(|url| (s.name.as_str(), url)),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline '{}' {}",
            self.pipeline,
            if self.success { "succeeded" } else { "failed" }
        )?;
        for stage in &self.stages {
            let tag = if stage.required { "" } else { " (optional)" };
            match stage.outcome {
                StageOutcome::Skipped { ref reason } => {
                    write!(f, "\n  {}{}: skipped, {}", stage.name, tag, reason)?
                }
                StageOutcome::Finished(GenerationResult::Failure(ref failure)) => {
                    write!(f, "\n  {}{}: failed, {}", stage.name, tag, failure)?
                }
                StageOutcome::Finished(GenerationResult::Success(_)) => {
                    write!(f, "\n  {}{}: ok", stage.name, tag)?;
                    if let Some(ref job_id) = stage.job_id {
                        write!(f, " (job {}", job_id)?;
                        if stage.duplicate {
                            write!(f, ", duplicate")?;
                        }
                        write!(f, ")")?;
                    }
                    if let Some(path) = stage.output_path() {
                        write!(f, " -> {}", path.display())?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::GenerationErrorKind;

    fn sample() -> PipelineResult {
        PipelineResult::new(
            "full_content",
            vec![
                StageReport::finished("music", true, GenerationResult::ready("/out/music.mp3")),
                StageReport::finished(
                    "image",
                    true,
                    GenerationResult::failure(GenerationErrorKind::QuotaExceeded, "limit"),
                ),
                StageReport::skipped("video", true, "dependency 'image' failed"),
                StageReport::finished(
                    "upload:youtube",
                    false,
                    GenerationResult::ready_remote("vid-1")
                        .with_metadata(serde_json::json!({"url": "https://youtu.be/x"})),
                ),
            ],
        )
    }

    #[test]
    fn test_success_requires_all_required_stages() {
        let result = sample();
        assert!(!result.success);
        assert_eq!(result.output_paths, vec![PathBuf::from("/out/music.mp3")]);
        assert_eq!(
            result.failed_stages().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["image"]
        );
        assert_eq!(result.skipped_stages().count(), 1);
        assert_eq!(result.uploaded_urls(), vec![("upload:youtube", "https://youtu.be/x")]);
    }

    #[test]
    fn test_optional_failure_keeps_success() {
        let result = PipelineResult::new(
            "p",
            vec![
                StageReport::finished("music", true, GenerationResult::ready("/a.mp3")),
                StageReport::finished(
                    "upload",
                    false,
                    GenerationResult::failure(GenerationErrorKind::Unknown, "503"),
                ),
            ],
        );
        assert!(result.success);
    }

    #[test]
    fn test_display_names_failed_stage_and_kind() {
        let text = sample().to_string();
        assert!(text.starts_with("Pipeline 'full_content' failed"));
        assert!(text.contains("image: failed, QuotaExceeded: limit"));
        assert!(text.contains("video: skipped, dependency 'image' failed"));
        assert!(text.contains("music: ok -> /out/music.mp3"));
    }
}
