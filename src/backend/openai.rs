//! reqwest client for the OpenAI REST API.

use super::{
    sse, AudioBackend, BackendResult, ChatBackend, CompletionBackend, ImageBackend,
    ModerationBackend,
};
use crate::error::{wrap_error, HttpStatus};
use crate::types::{
    AudioRequest, AudioTextResponse, ChatCompletionChunk, ChatCompletionRequest,
    ChatCompletionResponse, ChatResponse, CompletionRequest, CompletionResponse, ImageRequest,
    ImageResponse, ModerationRequest, ModerationResponse,
};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Errors raised by [`OpenAiClient`].
#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl HttpStatus for OpenAiError {
    fn http_status(&self) -> Option<u16> {
        match self {
            OpenAiError::Api { status, .. } => Some(*status),
            OpenAiError::Transport(e) => e.status().map(|s| s.as_u16()),
            OpenAiError::Decode(_) => None,
        }
    }
}

/// Live client for the OpenAI endpoints the adapters wrap.
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    organization: Option<String>,
}

impl OpenAiClient {
    pub fn builder() -> OpenAiClientBuilder {
        OpenAiClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http_client
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key);
        if let Some(org) = &self.organization {
            req = req.header("OpenAI-Organization", org);
        }
        req
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, OpenAiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.post(path).json(body).send().await?;
        let response = check_status(response).await?;
        let raw = response.bytes().await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn audio(
        &self,
        path: &str,
        request: &AudioRequest,
    ) -> std::result::Result<AudioTextResponse, OpenAiError> {
        let part = reqwest::multipart::Part::bytes(request.file.to_vec())
            .file_name(request.file_name.clone());
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", request.model.clone());
        if let Some(prompt) = &request.prompt {
            form = form.text("prompt", prompt.clone());
        }
        if let Some(lang) = &request.language {
            form = form.text("language", lang.clone());
        }
        if let Some(rf) = &request.response_format {
            form = form.text("response_format", rf.clone());
        }
        if let Some(temp) = request.temperature {
            form = form.text("temperature", temp.to_string());
        }
        for (key, value) in &request.extra {
            form = match value {
                // arrays go out as repeated `key[]` fields
                Value::Array(items) => items.iter().fold(form, |form, item| {
                    form.text(format!("{}[]", key), form_text(item))
                }),
                other => form.text(key.clone(), form_text(other)),
            };
        }
        let response = self.post(path).multipart(form).send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        // text/srt/vtt formats come back as a plain body
        match serde_json::from_str::<AudioTextResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) => Ok(AudioTextResponse {
                text: body,
                cache_hit: false,
                extra: Map::new(),
            }),
        }
    }
}

fn form_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn check_status(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, OpenAiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or(body);
    Err(OpenAiError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    async fn chat(&self, request: &ChatCompletionRequest) -> BackendResult<ChatResponse> {
        if !request.stream {
            let parsed: ChatCompletionResponse =
                self.post_json("/v1/chat/completions", request).await?;
            return Ok(ChatResponse::Completion(parsed));
        }

        let response = self
            .post("/v1/chat/completions")
            .json(request)
            .send()
            .await
            .map_err(OpenAiError::from)?;
        let response = check_status(response).await?;
        let frames = sse::decode(response.bytes_stream().boxed());
        let chunks = frames.map(|frame| -> Result<ChatCompletionChunk> {
            let value = frame.map_err(|e| wrap_error(Box::new(OpenAiError::Transport(e))))?;
            serde_json::from_value(value)
                .map_err(|e| wrap_error(Box::new(OpenAiError::Decode(e))))
        });
        Ok(ChatResponse::Stream(Box::pin(chunks)))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> BackendResult<CompletionResponse> {
        Ok(self.post_json("/v1/completions", request).await?)
    }
}

#[async_trait]
impl ImageBackend for OpenAiClient {
    async fn generate(&self, request: &ImageRequest) -> BackendResult<ImageResponse> {
        Ok(self.post_json("/v1/images/generations", request).await?)
    }

    async fn download(&self, url: &str) -> BackendResult<Bytes> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(OpenAiError::from)?;
        let response = check_status(response).await?;
        Ok(response.bytes().await.map_err(OpenAiError::from)?)
    }
}

#[async_trait]
impl AudioBackend for OpenAiClient {
    async fn transcribe(&self, request: &AudioRequest) -> BackendResult<AudioTextResponse> {
        Ok(self.audio("/v1/audio/transcriptions", request).await?)
    }

    async fn translate(&self, request: &AudioRequest) -> BackendResult<AudioTextResponse> {
        Ok(self.audio("/v1/audio/translations", request).await?)
    }
}

#[async_trait]
impl ModerationBackend for OpenAiClient {
    async fn moderate(&self, request: &ModerationRequest) -> BackendResult<ModerationResponse> {
        Ok(self.post_json("/v1/moderations", request).await?)
    }
}

pub struct OpenAiClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    organization: Option<String>,
    timeout_secs: u64,
}

impl OpenAiClientBuilder {
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: None,
            organization: None,
            timeout_secs: 60,
        }
    }
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Falls back to `OPENAI_API_KEY` and `OPENAI_BASE_URL` for unset values.
    pub fn build(self) -> Result<OpenAiClient> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "API key required",
                    ErrorContext::new()
                        .with_field_path("api_key")
                        .with_details("set it on the builder or via OPENAI_API_KEY"),
                )
            })?;
        let base_url = self
            .base_url
            .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid base URL '{}': {}", base_url, e),
                ErrorContext::new().with_field_path("base_url"),
            )
        })?;
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(OpenAiClient {
            http_client,
            base_url,
            api_key,
            organization: self.organization,
        })
    }
}

impl Default for OpenAiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
