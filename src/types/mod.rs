//! 类型模块：缓存答案与各模态的请求/响应结构。
//!
//! # Types Module
//!
//! Strongly-typed request and response shapes for every modality the adapters
//! cover, plus the canonical answer stored in the cache.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CanonicalAnswer`] | Normalized unit of cache storage |
//! | [`TokenCost`] | Tokens saved by a cache hit |
//! | [`ChatCompletionResponse`] / [`ChatCompletionChunk`] | Chat envelopes |
//! | [`CompletionResponse`] | Text completion envelope |
//! | [`ImageResponse`] | Image generation envelope |
//! | [`AudioTextResponse`] | Transcription / translation envelope |
//! | [`ModerationResponse`] | Moderation result list |
//!
//! Every envelope keeps unknown backend fields in a flattened `extra` map, so a
//! live response serializes back exactly as it arrived.

pub mod answer;
pub mod audio;
pub mod chat;
pub mod completion;
pub mod image;
pub mod message;
pub mod moderation;

pub use answer::{AnswerContent, AnswerKind, CanonicalAnswer, TokenCost};
pub use audio::{AudioRequest, AudioTextResponse};
pub use chat::{
    ChatChoice, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatResponse,
    ChatStream, ChunkChoice, ChunkDelta, ResponseMessage,
};
pub use completion::{CompletionChoice, CompletionRequest, CompletionResponse};
pub use image::{ImageData, ImageRequest, ImageResponse, ImageResponseFormat};
pub use message::{Message, MessageContent, MessageRole};
pub use moderation::{ModerationInput, ModerationRequest, ModerationResponse, ModerationResult};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token usage block of completion responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub(crate) fn is_false(b: &bool) -> bool {
    !*b
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
