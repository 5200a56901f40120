//! Generation requests submitted to providers.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jobs::model::ContentType;

/// Well-known parameter names shared by providers and pipelines.
pub mod params {
    pub const BPM: &str = "bpm";
    pub const DURATION_SECONDS: &str = "duration_seconds";
    pub const LYRICS: &str = "lyrics";
    pub const REFERENCE_AUDIO_URL: &str = "reference_audio_url";
    pub const TEMPERATURE: &str = "temperature";
    pub const ASPECT_RATIO: &str = "aspect_ratio";
    pub const FIRST_FRAME_IMAGE: &str = "first_frame_image";
    pub const NUM_IMAGES: &str = "num_images";
}

/// A request for one piece of generated media.
///
/// `params` holds every provider parameter that affects the output and
/// therefore participates in the fingerprint. `output_path` and `command`
/// do not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub content_type: ContentType,
    pub provider: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl GenerationRequest {
    pub fn new(
        content_type: ContentType,
        provider: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            content_type,
            provider: provider.into(),
            prompt: prompt.into(),
            style: None,
            params: BTreeMap::new(),
            output_path: None,
            command: None,
        }
    }

    pub fn music(provider: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(ContentType::Music, provider, prompt)
    }

    pub fn video(provider: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(ContentType::Video, provider, prompt)
    }

    pub fn image(provider: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(ContentType::Image, provider, prompt)
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Sets a material parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Returns the parameter if it is present and not `null`.
    pub fn get_param(&self, key: &str) -> Option<&Value> {
        self.params.get(key).filter(|v| !v.is_null())
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.get_param(key).is_some()
    }

    /// Material parameters as a JSON object, `null` entries dropped.
    pub fn params_json(&self) -> Value {
        Value::Object(
            self.params
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// The caller-supplied command, or a command line rendered from the request.
    pub fn command_line(&self) -> String {
        if let Some(ref command) = self.command {
            return command.clone();
        }

        let mut line = format!(
            "ai-content {} --prompt {} --provider {}",
            self.content_type,
            shell_quote(&self.prompt),
            self.provider
        );
        if let Some(ref style) = self.style {
            let _ = write!(line, " --style {}", shell_quote(style));
        }
        for (key, value) in self.params.iter().filter(|(_, v)| !v.is_null()) {
            let flag = key.replace('_', "-");
            match value {
                Value::String(s) => {
                    let _ = write!(line, " --{} {}", flag, shell_quote(s));
                }
                other => {
                    let _ = write!(line, " --{} {}", flag, other);
                }
            }
        }
        if let Some(ref output) = self.output_path {
            let _ = write!(
                line,
                " --output {}",
                shell_quote(&output.display().to_string())
            );
        }
        line
    }
}

fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
