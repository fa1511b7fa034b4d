//! Scripted backends and fixtures shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::channel::mpsc;
use futures::stream;
use llm_cache_adapter::backend::{
    AudioBackend, BackendResult, ChatBackend, CompletionBackend, ImageBackend, ModerationBackend,
};
use llm_cache_adapter::cache::{CacheConfig, CacheOptions, ExactMatchCache};
use llm_cache_adapter::types::{
    AudioRequest, AudioTextResponse, ChatCompletionChunk, ChatCompletionRequest,
    ChatCompletionResponse, ChatResponse, CompletionRequest, CompletionResponse, ImageRequest,
    ImageResponse, ModerationInput, ModerationRequest, ModerationResponse,
};
use serde_json::json;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FakeError(pub String);

pub fn memory_cache() -> Arc<ExactMatchCache> {
    cache_with(CacheConfig::default())
}

pub fn cache_with(config: CacheConfig) -> Arc<ExactMatchCache> {
    Arc::new(ExactMatchCache::in_memory(config, 64))
}

pub fn options(cache: &Arc<ExactMatchCache>) -> CacheOptions {
    CacheOptions::new().with_cache(cache.clone())
}

pub fn text_chunk(text: &str) -> ChatCompletionChunk {
    serde_json::from_value(json!({
        "id": "chatcmpl-live",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000u64,
        "model": "gpt-3.5-turbo",
        "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
    }))
    .unwrap()
}

pub fn live_completion(text: &str) -> ChatCompletionResponse {
    serde_json::from_value(json!({
        "id": "chatcmpl-live",
        "object": "chat.completion",
        "created": 1_700_000_000u64,
        "model": "gpt-3.5-turbo",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
    }))
    .unwrap()
}

pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        w,
        h,
        image::Rgb([10, 120, 200]),
    ));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

pub fn moderation_response(flags: &[bool]) -> ModerationResponse {
    let results: Vec<_> = flags
        .iter()
        .map(|f| json!({"flagged": f, "categories": {"violence": f}, "category_scores": {"violence": 0.5}}))
        .collect();
    serde_json::from_value(json!({
        "id": "modr-live",
        "model": "text-moderation-007",
        "results": results
    }))
    .unwrap()
}

/// Chat backend with a fixed reply and a call counter.
pub struct FakeChat {
    calls: AtomicUsize,
    reply: String,
    parts: Vec<String>,
    channel: Mutex<Option<mpsc::UnboundedReceiver<llm_cache_adapter::Result<ChatCompletionChunk>>>>,
    failure: Option<String>,
}

impl FakeChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: reply.to_string(),
            parts: reply.split_inclusive(' ').map(String::from).collect(),
            channel: Mutex::new(None),
            failure: None,
        }
    }

    /// Streams whatever the test pushes into the returned sender.
    pub fn channel() -> (
        Self,
        mpsc::UnboundedSender<llm_cache_adapter::Result<ChatCompletionChunk>>,
    ) {
        let (tx, rx) = mpsc::unbounded();
        let fake = Self::replying("");
        *fake.channel.lock().unwrap() = Some(rx);
        (fake, tx)
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::replying("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for FakeChat {
    async fn chat(&self, request: &ChatCompletionRequest) -> BackendResult<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(Box::new(FakeError(message.clone())));
        }
        if !request.stream {
            return Ok(ChatResponse::Completion(live_completion(&self.reply)));
        }
        if let Some(rx) = self.channel.lock().unwrap().take() {
            return Ok(ChatResponse::Stream(Box::pin(rx)));
        }
        let chunks: Vec<_> = self.parts.iter().map(|p| Ok(text_chunk(p))).collect();
        Ok(ChatResponse::Stream(Box::pin(stream::iter(chunks))))
    }
}

pub struct FakeCompletion {
    pub calls: AtomicUsize,
    pub reply: String,
}

#[async_trait]
impl CompletionBackend for FakeCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> BackendResult<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(json!({
            "id": "cmpl-live",
            "object": "text_completion",
            "created": 1_700_000_000u64,
            "model": "gpt-3.5-turbo-instruct",
            "choices": [{"text": self.reply, "index": 0, "finish_reason": "length", "logprobs": null}]
        }))?)
    }
}

/// Image backend producing a `w x h` PNG, as a URL or inline.
pub struct FakeImage {
    pub generated: AtomicUsize,
    pub downloads: AtomicUsize,
    pub png: Vec<u8>,
}

impl FakeImage {
    pub fn new(w: u32, h: u32) -> Self {
        Self {
            generated: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            png: png_bytes(w, h),
        }
    }
}

#[async_trait]
impl ImageBackend for FakeImage {
    async fn generate(&self, request: &ImageRequest) -> BackendResult<ImageResponse> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        let data = match request.response_format.as_str() {
            "b64_json" => json!({"b64_json": STANDARD.encode(&self.png)}),
            "url" => json!({"url": "https://images.example/generated.png"}),
            other => return Err(Box::new(FakeError(format!("unsupported format {}", other)))),
        };
        Ok(serde_json::from_value(json!({"created": 1_700_000_000u64, "data": [data]}))?)
    }

    async fn download(&self, _url: &str) -> BackendResult<Bytes> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(self.png.clone()))
    }
}

pub struct FakeAudio {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AudioBackend for FakeAudio {
    async fn transcribe(&self, _request: &AudioRequest) -> BackendResult<AudioTextResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(json!({"text": "bonjour", "language": "fr"}))?)
    }

    async fn translate(&self, _request: &AudioRequest) -> BackendResult<AudioTextResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::from_value(json!({"text": "hello"}))?)
    }
}

/// Moderation backend flagging inputs that contain "kill".
pub struct FakeModeration {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ModerationBackend for FakeModeration {
    async fn moderate(&self, request: &ModerationRequest) -> BackendResult<ModerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let flags: Vec<bool> = match &request.input {
            ModerationInput::Single(s) => vec![s.contains("kill")],
            ModerationInput::Batch(items) => items.iter().map(|s| s.contains("kill")).collect(),
        };
        Ok(moderation_response(&flags))
    }
}
