//! The predefined full content pipeline: music and image in parallel, a
//! video that opens on the image, the merged music video, then uploads.

use std::path::PathBuf;

use crate::provider::request::params;
use crate::provider::GenerationRequest;

use super::stage::{PipelineDefinition, Stage};

pub const PIPELINE_NAME: &str = "full_content";
pub const MUSIC_STAGE: &str = "music";
pub const IMAGE_STAGE: &str = "image";
pub const VIDEO_STAGE: &str = "video";
pub const MERGE_STAGE: &str = "merge";

/// Inputs of [`full_content_pipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSpec {
    pub music: GenerationRequest,
    pub image: GenerationRequest,
    /// Its `first_frame_image` parameter is filled from the image stage.
    pub video: GenerationRequest,
    pub merged_output: PathBuf,
    /// Best-effort; a failed upload does not fail the pipeline.
    pub upload_destinations: Vec<String>,
}

/// Name of the upload stage for a destination.
pub fn upload_stage_name(destination: &str) -> String {
    format!("upload:{}", destination)
}

pub fn full_content_pipeline(spec: ContentSpec) -> PipelineDefinition {
    let mut definition = PipelineDefinition::new(PIPELINE_NAME)
        .parallel(vec![
            Stage::generate(MUSIC_STAGE, spec.music),
            Stage::generate(IMAGE_STAGE, spec.image),
        ])
        .then(
            Stage::generate(VIDEO_STAGE, spec.video).bind(IMAGE_STAGE, params::FIRST_FRAME_IMAGE),
        )
        .then(Stage::merge(
            MERGE_STAGE,
            MUSIC_STAGE,
            VIDEO_STAGE,
            spec.merged_output,
        ));

    let uploads: Vec<Stage> = spec
        .upload_destinations
        .iter()
        .map(|destination| {
            Stage::upload(upload_stage_name(destination), MERGE_STAGE, destination.clone())
        })
        .collect();
    if !uploads.is_empty() {
        definition = definition.parallel(uploads);
    }
    definition
}
