//! Builders for requests and pipeline inputs.

#![allow(dead_code)]

use std::path::PathBuf;

use ai_content::pipeline::ContentSpec;
use ai_content::provider::request::params;
use ai_content::GenerationRequest;

/// `{provider: lyria, content_type: music, prompt: "Smooth jazz", bpm: 95}`
pub fn jazz_request() -> GenerationRequest {
    GenerationRequest::music("lyria", "Smooth jazz").param(params::BPM, 95)
}

/// Builder for `ContentSpec`.
pub struct ContentSpecBuilder {
    music: GenerationRequest,
    image: GenerationRequest,
    video: GenerationRequest,
    merged_output: PathBuf,
    upload_destinations: Vec<String>,
}

impl ContentSpecBuilder {
    pub fn new(merged_output: impl Into<PathBuf>) -> Self {
        Self {
            music: jazz_request(),
            image: GenerationRequest::image("imagen", "Rainy city at night")
                .param(params::ASPECT_RATIO, "16:9"),
            video: GenerationRequest::video("veo", "Slow pan across the rainy city")
                .param(params::DURATION_SECONDS, 8),
            merged_output: merged_output.into(),
            upload_destinations: Vec::new(),
        }
    }

    pub fn music(mut self, request: GenerationRequest) -> Self {
        self.music = request;
        self
    }

    pub fn image(mut self, request: GenerationRequest) -> Self {
        self.image = request;
        self
    }

    pub fn video(mut self, request: GenerationRequest) -> Self {
        self.video = request;
        self
    }

    pub fn upload_to(mut self, destination: &str) -> Self {
        self.upload_destinations.push(destination.to_string());
        self
    }

    pub fn build(self) -> ContentSpec {
        ContentSpec {
            music: self.music,
            image: self.image,
            video: self.video,
            merged_output: self.merged_output,
            upload_destinations: self.upload_destinations,
        }
    }
}
