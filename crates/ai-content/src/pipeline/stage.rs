//! Declarative pipeline model: stages grouped into parallel or
//! sequential steps.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::provider::GenerationRequest;

use super::error::PipelineError;

/// Feeds the artifact of an earlier stage into a request parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub from_stage: String,
    pub param: String,
}

/// What a stage does.
#[derive(Debug, Clone, PartialEq)]
pub enum StageAction {
    /// Submit a request through the job tracker.
    Generate {
        request: GenerationRequest,
        bindings: Vec<Binding>,
    },
    /// Combine the audio and video artifacts of two earlier stages.
    Merge {
        audio_stage: String,
        video_stage: String,
        output: PathBuf,
    },
    /// Publish the artifact of an earlier stage.
    Upload {
        source_stage: String,
        destination: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: String,
    /// A failed required stage fails the pipeline.
    pub required: bool,
    /// Stages that must have succeeded before this one runs.
    pub depends_on: Vec<String>,
    pub action: StageAction,
}

impl Stage {
    /// A required generation stage.
    pub fn generate(name: impl Into<String>, request: GenerationRequest) -> Self {
        Self {
            name: name.into(),
            required: true,
            depends_on: Vec::new(),
            action: StageAction::Generate {
                request,
                bindings: Vec::new(),
            },
        }
    }

    /// An optional merge stage depending on both inputs. A failed merge
    /// skips its dependents but leaves the pipeline successful.
    pub fn merge(
        name: impl Into<String>,
        audio_stage: impl Into<String>,
        video_stage: impl Into<String>,
        output: impl Into<PathBuf>,
    ) -> Self {
        let audio_stage = audio_stage.into();
        let video_stage = video_stage.into();
        Self {
            name: name.into(),
            required: false,
            depends_on: vec![audio_stage.clone(), video_stage.clone()],
            action: StageAction::Merge {
                audio_stage,
                video_stage,
                output: output.into(),
            },
        }
    }

    /// An optional upload stage depending on its source.
    pub fn upload(
        name: impl Into<String>,
        source_stage: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        let source_stage = source_stage.into();
        Self {
            name: name.into(),
            required: false,
            depends_on: vec![source_stage.clone()],
            action: StageAction::Upload {
                source_stage,
                destination: destination.into(),
            },
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn depends_on(mut self, stage: impl Into<String>) -> Self {
        let stage = stage.into();
        if !self.depends_on.contains(&stage) {
            self.depends_on.push(stage);
        }
        self
    }

    /// Passes `from_stage`'s output path as request parameter `param`.
    /// Implies a dependency. No effect on non-generation stages.
    pub fn bind(mut self, from_stage: impl Into<String>, param: impl Into<String>) -> Self {
        let from_stage = from_stage.into();
        if let StageAction::Generate {
            ref mut bindings, ..
        } = self.action
        {
            bindings.push(Binding {
                from_stage: from_stage.clone(),
                param: param.into(),
            });
        }
        self.depends_on(from_stage)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageGroup {
    /// Dispatched concurrently; the group settles when every stage has.
    Parallel(Vec<Stage>),
    Sequential(Stage),
}

impl StageGroup {
    pub fn stages(&self) -> &[Stage] {
        match self {
            StageGroup::Parallel(stages) => stages,
            StageGroup::Sequential(stage) => std::slice::from_ref(stage),
        }
    }
}

/// A named workflow: groups run in order.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    pub name: String,
    pub groups: Vec<StageGroup>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn parallel(mut self, stages: Vec<Stage>) -> Self {
        self.groups.push(StageGroup::Parallel(stages));
        self
    }

    pub fn then(mut self, stage: Stage) -> Self {
        self.groups.push(StageGroup::Sequential(stage));
        self
    }

    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.groups.iter().flat_map(|g| g.stages().iter())
    }

    /// Checks that stage names are unique and that every dependency names
    /// a stage from an earlier group.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |reason: String| PipelineError::InvalidDefinition {
            pipeline: self.name.clone(),
            reason,
        };

        let mut earlier: HashSet<&str> = HashSet::new();
        for group in &self.groups {
            if group.stages().is_empty() {
                return Err(invalid("empty parallel group".to_string()));
            }

            for stage in group.stages() {
                if stage.name.trim().is_empty() {
                    return Err(invalid("stage with an empty name".to_string()));
                }
                for dependency in &stage.depends_on {
                    if !earlier.contains(dependency.as_str()) {
                        return Err(invalid(format!(
                            "stage '{}' depends on '{}', which does not run before it",
                            stage.name, dependency
                        )));
                    }
                }
            }

            for stage in group.stages() {
                if !earlier.insert(stage.name.as_str()) {
                    return Err(invalid(format!("duplicate stage name '{}'", stage.name)));
                }
            }
        }
        Ok(())
    }
}
