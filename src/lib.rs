//! # llm-cache-adapter
//!
//! 为 OpenAI 风格的聊天、补全、图像、音频与审核调用提供缓存适配层。
//!
//! Cache-aware adapters for OpenAI-style endpoints. Each call is first looked
//! up in a cache; on a miss the live backend is called and its answer stored,
//! on a hit a response in the endpoint's own wire shape is rebuilt from the
//! stored answer.
//!
//! ## Core Behavior
//!
//! - **Same shapes both ways**: a cached response is indistinguishable from a
//!   live one apart from its `cache_hit` marker
//! - **Streaming passthrough**: live chat streams are forwarded chunk by chunk
//!   and only stored once fully consumed
//! - **Token accounting**: chat hits report the tokens they saved
//! - **Uniform errors**: every live-call failure surfaces as [`Error::Backend`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_cache_adapter::adapter::ChatCompletion;
//! use llm_cache_adapter::cache::CacheOptions;
//! use llm_cache_adapter::types::{ChatCompletionRequest, Message};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> llm_cache_adapter::Result<()> {
//!     let chat = ChatCompletion::from_env()?;
//!     let request = ChatCompletionRequest::new("gpt-3.5-turbo", vec![Message::user("hello")])
//!         .stream(true);
//!
//!     let response = chat.create(request, CacheOptions::new()).await?;
//!     if let Some(mut stream) = response.into_stream() {
//!         while let Some(chunk) = stream.next().await {
//!             print!("{}", chunk?.delta_content());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapter`] | Chat, completion, image, audio and moderation adapters |
//! | [`cache`] | Call orchestration, cache seam and the exact-match default |
//! | [`backend`] | Live backends and the OpenAI client |
//! | [`types`] | Request/response envelopes and the canonical answer |
//! | [`tokens`] | Token counting for cache hits |
//! | [`config`] | YAML configuration |

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod config;
pub mod tokens;
pub mod types;

pub use adapter::{Audio, ChatCompletion, Completion, Image, Moderation};
pub use cache::{adapt, CacheOptions};
pub use config::AdapterConfig;
pub use types::{
    message::{Message, MessageRole},
    CanonicalAnswer, TokenCost,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed stream of fallible items.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
