//! Audio transcription / translation shapes.

use super::is_false;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request for transcription or translation. The audio travels as multipart
/// form data, so this is not serialized as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRequest {
    pub model: String,
    pub file: Bytes,
    pub file_name: String,
    pub prompt: Option<String>,
    pub language: Option<String>,
    pub response_format: Option<String>,
    pub temperature: Option<f32>,
    /// Any other form field (`timestamp_granularities`, ...), sent as text
    /// parts of the multipart body.
    pub extra: Map<String, Value>,
}

impl AudioRequest {
    pub fn new(model: impl Into<String>, file: impl Into<Bytes>) -> Self {
        Self {
            model: model.into(),
            file: file.into(),
            file_name: "audio.mp3".to_string(),
            prompt: None,
            language: None,
            response_format: None,
            temperature: None,
            extra: Map::new(),
        }
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// `{ "text": ... }` as returned by the audio endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTextResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cache_hit: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
