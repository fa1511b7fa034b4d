//! Cached chat completions, plain and streaming.

use super::stream::CacheWritingStream;
use crate::backend::{ChatBackend, OpenAiClient};
use crate::cache::{adapt, CacheOptions, CacheWriter};
use crate::error::wrap_error;
use crate::tokens::{default_counter, saved_tokens, TokenCounter};
use crate::types::{
    unix_now, CanonicalAnswer, ChatChoice, ChatCompletionChunk, ChatCompletionRequest,
    ChatCompletionResponse, ChatResponse, ChatStream, ChunkChoice, ChunkDelta, MessageRole,
    ResponseMessage, TokenCost, Usage,
};
use crate::Result;
use futures::stream;
use serde_json::Map;
use std::sync::Arc;

pub const CHAT_COMPLETION_OBJECT: &str = "chat.completion";
pub const CHAT_CHUNK_OBJECT: &str = "chat.completion.chunk";
const FINISH_STOP: &str = "stop";

/// Chat completions served from the cache when possible.
///
/// A request with `stream` set always yields [`ChatResponse::Stream`], whether
/// the answer came from the cache or from the backend.
pub struct ChatCompletion {
    backend: Arc<dyn ChatBackend>,
    token_counter: Arc<dyn TokenCounter>,
}

impl ChatCompletion {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            token_counter: default_counter(),
        }
    }

    /// Backed by an [`OpenAiClient`] configured from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Arc::new(OpenAiClient::builder().build()?)))
    }

    /// Tokenizer used to report the tokens a cache hit saved. Defaults to the
    /// shared `cl100k_base` counter.
    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = counter;
        self
    }

    pub async fn create(
        &self,
        request: ChatCompletionRequest,
        options: CacheOptions,
    ) -> Result<ChatResponse> {
        self.create_with_llm(request, options, None).await
    }

    /// Like [`create`](Self::create), with `llm` standing in for the
    /// configured backend on this call.
    pub async fn create_with_llm(
        &self,
        request: ChatCompletionRequest,
        options: CacheOptions,
        llm: Option<&dyn ChatBackend>,
    ) -> Result<ChatResponse> {
        let backend = llm.unwrap_or(self.backend.as_ref());
        let counter = self.token_counter.as_ref();
        let count_tokens = options.cache().config().enable_token_counter;
        let cache_request = serde_json::to_value(&request)?;
        let req = &request;

        adapt(
            cache_request,
            &options,
            move || async move { backend.chat(req).await.map_err(wrap_error) },
            move |answer| {
                let text = answer.into_text();
                let cost = saved_tokens(count_tokens, counter, &req.messages, &text);
                Ok(if req.stream {
                    ChatResponse::Stream(stream_from_cache(text, cost))
                } else {
                    ChatResponse::Completion(completion_from_cache(text, cost))
                })
            },
            |live, writer| async move { Ok(store_live(live, writer).await) },
        )
        .await
    }
}

async fn store_live(live: ChatResponse, writer: CacheWriter) -> ChatResponse {
    match live {
        ChatResponse::Completion(response) => {
            match answer_from_completion(&response) {
                Some(answer) => writer.save(answer).await,
                None => tracing::debug!("chat response carries no text content, not cached"),
            }
            ChatResponse::Completion(response)
        }
        ChatResponse::Stream(inner) => {
            ChatResponse::Stream(Box::pin(CacheWritingStream::new(inner, writer)))
        }
    }
}

/// Text of the first choice of a live completion.
pub fn answer_from_completion(response: &ChatCompletionResponse) -> Option<CanonicalAnswer> {
    response.first_content().map(CanonicalAnswer::text)
}

/// Non-streaming response for a cached answer.
pub fn completion_from_cache(text: String, cost: TokenCost) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: None,
        object: CHAT_COMPLETION_OBJECT.to_string(),
        created: unix_now(),
        model: None,
        choices: vec![ChatChoice {
            index: 0,
            message: ResponseMessage {
                role: MessageRole::Assistant,
                content: Some(text),
                extra: Map::new(),
            },
            finish_reason: Some(FINISH_STOP.to_string()),
            extra: Map::new(),
        }],
        usage: Some(Usage::default()),
        cache_hit: true,
        token_cost: Some(cost),
        extra: Map::new(),
    }
}

/// The three chunks a cached answer is replayed as: the role, the whole
/// text, then an empty delta carrying the cache marker and `finish_reason`.
/// All share one `created` timestamp.
pub fn chunks_from_cache(text: String, cost: TokenCost) -> Vec<ChatCompletionChunk> {
    let created = unix_now();
    let chunk = |delta: ChunkDelta, finish_reason: Option<&str>| ChatCompletionChunk {
        id: None,
        object: CHAT_CHUNK_OBJECT.to_string(),
        created,
        model: None,
        choices: vec![ChunkChoice {
            index: 0,
            delta,
            finish_reason: finish_reason.map(String::from),
            extra: Map::new(),
        }],
        cache_hit: false,
        token_cost: None,
        extra: Map::new(),
    };

    let role = chunk(
        ChunkDelta {
            role: Some(MessageRole::Assistant),
            ..Default::default()
        },
        None,
    );
    let content = chunk(
        ChunkDelta {
            content: Some(text),
            ..Default::default()
        },
        None,
    );
    let mut last = chunk(ChunkDelta::default(), Some(FINISH_STOP));
    last.cache_hit = true;
    last.token_cost = Some(cost);
    vec![role, content, last]
}

/// [`chunks_from_cache`] as a stream.
pub fn stream_from_cache(text: String, cost: TokenCost) -> ChatStream {
    Box::pin(stream::iter(chunks_from_cache(text, cost).into_iter().map(Ok)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn cached_completion_shape() {
        let resp = completion_from_cache("hello".into(), TokenCost::new(10, 2));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["object"], "chat.completion");
        assert_eq!(value["cache_hit"], true);
        assert_eq!(value["choices"][0]["message"]["role"], "assistant");
        assert_eq!(value["choices"][0]["message"]["content"], "hello");
        assert_eq!(value["choices"][0]["finish_reason"], "stop");
        assert_eq!(value["usage"]["total_tokens"], 0);
        assert_eq!(
            value["token_cost"],
            json!({"input_tokens": 10, "output_tokens": 2})
        );
    }

    #[tokio::test]
    async fn cached_stream_is_three_chunks() {
        let chunks: Vec<_> = stream_from_cache("hello".into(), TokenCost::default())
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.object == CHAT_CHUNK_OBJECT));
        assert!(chunks.iter().all(|c| c.created == chunks[0].created));

        assert_eq!(chunks[0].choices[0].delta.role, Some(MessageRole::Assistant));
        assert_eq!(chunks[0].delta_content(), "");
        assert_eq!(chunks[1].delta_content(), "hello");
        assert!(!chunks[0].cache_hit && !chunks[1].cache_hit);

        let last = &chunks[2];
        assert!(last.cache_hit);
        assert_eq!(last.choices[0].delta, ChunkDelta::default());
        assert_eq!(last.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(last.token_cost, Some(TokenCost::default()));
    }

    #[test]
    fn extracts_first_choice() {
        let resp = completion_from_cache("stored".into(), TokenCost::default());
        assert_eq!(
            answer_from_completion(&resp),
            Some(CanonicalAnswer::text("stored"))
        );
    }
}
