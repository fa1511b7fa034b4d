//! 实时调用模块：各模态的后端接口与基于 reqwest 的 OpenAI 客户端。
//!
//! # Live Backend Module
//!
//! One trait per modality. The adapters hold an `Arc<dyn …Backend>` and call
//! it only when the cache cannot answer. Backends report failures as
//! [`BoxError`]; the adapters normalize them with [`crate::error::wrap_error`].
//!
//! | Trait | Live endpoint |
//! |-------|---------------|
//! | [`ChatBackend`] | `/v1/chat/completions` (JSON or SSE) |
//! | [`CompletionBackend`] | `/v1/completions` |
//! | [`ImageBackend`] | `/v1/images/generations`, plus image download |
//! | [`AudioBackend`] | `/v1/audio/transcriptions`, `/v1/audio/translations` |
//! | [`ModerationBackend`] | `/v1/moderations` |

mod openai;
pub mod sse;

pub use openai::{OpenAiClient, OpenAiClientBuilder, OpenAiError};

use crate::error::BoxError;
use crate::types::{
    AudioRequest, AudioTextResponse, ChatCompletionRequest, ChatResponse, CompletionRequest,
    CompletionResponse, ImageRequest, ImageResponse, ModerationRequest, ModerationResponse,
};
use async_trait::async_trait;
use bytes::Bytes;

/// Result type of a live backend call.
pub type BackendResult<T> = std::result::Result<T, BoxError>;

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns a stream exactly when `request.stream` is set.
    async fn chat(&self, request: &ChatCompletionRequest) -> BackendResult<ChatResponse>;
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> BackendResult<CompletionResponse>;
}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> BackendResult<ImageResponse>;

    /// Fetch the bytes behind an image URL returned by `generate`.
    async fn download(&self, url: &str) -> BackendResult<Bytes>;
}

#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn transcribe(&self, request: &AudioRequest) -> BackendResult<AudioTextResponse>;
    async fn translate(&self, request: &AudioRequest) -> BackendResult<AudioTextResponse>;
}

#[async_trait]
pub trait ModerationBackend: Send + Sync {
    async fn moderate(&self, request: &ModerationRequest) -> BackendResult<ModerationResponse>;
}
