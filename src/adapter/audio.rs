//! Cached audio transcription and translation.

use crate::backend::{AudioBackend, OpenAiClient};
use crate::cache::{adapt, CacheOptions};
use crate::error::wrap_error;
use crate::types::{AudioRequest, AudioTextResponse, CanonicalAnswer};
use crate::Result;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTask {
    Transcribe,
    Translate,
}

impl AudioTask {
    pub fn endpoint(&self) -> &'static str {
        match self {
            AudioTask::Transcribe => "transcriptions",
            AudioTask::Translate => "translations",
        }
    }
}

pub struct Audio {
    backend: Arc<dyn AudioBackend>,
}

impl Audio {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self { backend }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Arc::new(OpenAiClient::builder().build()?)))
    }

    pub async fn transcribe(
        &self,
        request: AudioRequest,
        options: CacheOptions,
    ) -> Result<AudioTextResponse> {
        self.run(AudioTask::Transcribe, request, options, None).await
    }

    pub async fn translate(
        &self,
        request: AudioRequest,
        options: CacheOptions,
    ) -> Result<AudioTextResponse> {
        self.run(AudioTask::Translate, request, options, None).await
    }

    /// Run `task`, with `llm` standing in for the configured backend when set.
    pub async fn run(
        &self,
        task: AudioTask,
        request: AudioRequest,
        options: CacheOptions,
        llm: Option<&dyn AudioBackend>,
    ) -> Result<AudioTextResponse> {
        let backend = llm.unwrap_or(self.backend.as_ref());
        let req = &request;

        adapt(
            cache_request(task, req),
            &options,
            move || async move {
                let live = match task {
                    AudioTask::Transcribe => backend.transcribe(req).await,
                    AudioTask::Translate => backend.translate(req).await,
                };
                live.map_err(wrap_error)
            },
            |answer| Ok(audio_response_from_cache(answer.into_text())),
            |live, writer| async move {
                writer.save(CanonicalAnswer::text(live.text.clone())).await;
                Ok(live)
            },
        )
        .await
    }
}

/// Identity of an audio call: the task, the parameters and a digest of the
/// audio bytes.
fn cache_request(task: AudioTask, request: &AudioRequest) -> Value {
    let digest = Sha256::digest(&request.file);
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    json!({
        "task": task.endpoint(),
        "model": request.model,
        "file_sha256": hex,
        "prompt": request.prompt,
        "language": request.language,
        "response_format": request.response_format,
        "temperature": request.temperature,
        "extra": request.extra,
    })
}

pub fn audio_response_from_cache(text: String) -> AudioTextResponse {
    AudioTextResponse {
        text,
        cache_hit: true,
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_separates_tasks_and_audio() {
        let req = AudioRequest::new("whisper-1", &b"RIFF...."[..]);
        let other = AudioRequest::new("whisper-1", &b"RIFF!!!!"[..]);
        assert_ne!(
            cache_request(AudioTask::Transcribe, &req),
            cache_request(AudioTask::Translate, &req)
        );
        assert_ne!(
            cache_request(AudioTask::Transcribe, &req),
            cache_request(AudioTask::Transcribe, &other)
        );
        assert_ne!(
            cache_request(AudioTask::Transcribe, &req),
            cache_request(
                AudioTask::Transcribe,
                &req.clone()
                    .with_field("timestamp_granularities", json!(["word"]))
            )
        );
        // the file name does not change what was said
        assert_eq!(
            cache_request(AudioTask::Transcribe, &req),
            cache_request(AudioTask::Transcribe, &req.clone().file_name("b.wav"))
        );
    }

    #[test]
    fn cached_response_is_marked() {
        let resp = audio_response_from_cache("hello".into());
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"text": "hello", "cache_hit": true})
        );
    }
}
