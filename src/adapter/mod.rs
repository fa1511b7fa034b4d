//! 适配器模块：为各模态的实时调用接入缓存。
//!
//! # Modality Adapters
//!
//! Each adapter mirrors one OpenAI endpoint. A call goes through
//! [`crate::cache::adapt`] with three pieces supplied by the adapter:
//!
//! - the live call on its backend, errors normalized to [`crate::Error::Backend`]
//! - a response builder that turns a stored answer into the endpoint's shape
//! - an answer extractor that stores what the live call returned
//!
//! | Adapter | Stored answer | Served from cache as |
//! |---------|---------------|----------------------|
//! | [`ChatCompletion`] | first choice text | completion, or three chunks when streaming |
//! | [`Completion`] | first choice text | `text_completion` |
//! | [`Image`] | base64 image | resized JPEG, inline or as a local file |
//! | [`Audio`] | transcript text | `{ "text": ... }` |
//! | [`Moderation`] | indented JSON | the stored results, verbatim |
//!
//! Every response served from the cache carries `cache_hit = true`, except
//! moderation results which are returned exactly as stored.
//!
//! ## Example
//!
//! ```rust,no_run
//! use llm_cache_adapter::adapter::ChatCompletion;
//! use llm_cache_adapter::cache::CacheOptions;
//! use llm_cache_adapter::types::{ChatCompletionRequest, Message};
//!
//! # async fn run() -> llm_cache_adapter::Result<()> {
//! let chat = ChatCompletion::from_env()?;
//! let request = ChatCompletionRequest::new("gpt-3.5-turbo", vec![Message::user("hi")]);
//! let response = chat.create(request, CacheOptions::new()).await?;
//! println!("{:?}", response.into_completion().and_then(|c| c.first_content().map(String::from)));
//! # Ok(())
//! # }
//! ```

mod audio;
mod chat;
mod completion;
mod image;
mod moderation;
mod stream;

pub use self::audio::{audio_response_from_cache, Audio, AudioTask};
pub use self::chat::{
    answer_from_completion, chunks_from_cache, completion_from_cache, stream_from_cache,
    ChatCompletion, CHAT_CHUNK_OBJECT, CHAT_COMPLETION_OBJECT,
};
pub use self::completion::{Completion, TEXT_COMPLETION_OBJECT};
pub use self::image::{answer_from_image, image_response_from_cache, Image};
pub use self::moderation::{answer_from_response, response_from_cache, Moderation};
pub use self::stream::CacheWritingStream;

/// Builders and extractors of the text completion endpoint, which share names
/// with the chat ones.
pub mod text {
    pub use super::completion::{answer_from_completion, completion_from_cache};
}
