//! End-to-end behavior of the chat adapter against scripted backends.

mod common;

use common::{memory_cache, options, text_chunk, FakeChat};
use futures::StreamExt;
use llm_cache_adapter::cache::{CacheConfig, CacheCore};
use llm_cache_adapter::tokens::TokenCounter;
use llm_cache_adapter::types::{ChatCompletionRequest, Message, TokenCost};
use llm_cache_adapter::{CanonicalAnswer, ChatCompletion, Error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn request(prompt: &str) -> ChatCompletionRequest {
    ChatCompletionRequest::new(
        "gpt-3.5-turbo",
        vec![Message::system("be brief"), Message::user(prompt)],
    )
}

#[tokio::test]
async fn miss_stores_then_hit_skips_backend() {
    let cache = memory_cache();
    let backend = Arc::new(FakeChat::replying("Paris"));
    let chat = ChatCompletion::new(backend.clone());

    let live = chat
        .create(request("capital of France?"), options(&cache))
        .await
        .unwrap()
        .into_completion()
        .unwrap();
    assert!(!live.cache_hit);
    assert_eq!(live.id.as_deref(), Some("chatcmpl-live"));

    let cached = chat
        .create(request("capital of France?"), options(&cache))
        .await
        .unwrap()
        .into_completion()
        .unwrap();
    assert!(cached.cache_hit);
    assert_eq!(cached.first_content(), Some("Paris"));
    assert_eq!(cached.object, "chat.completion");
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn stream_flag_decides_the_cached_shape() {
    let cache = memory_cache();
    let backend = Arc::new(FakeChat::replying("four"));
    let chat = ChatCompletion::new(backend.clone());

    chat.create(request("2+2?"), options(&cache)).await.unwrap();

    let hit = chat
        .create(request("2+2?").stream(true), options(&cache))
        .await
        .unwrap();
    assert!(hit.is_stream());
    let chunks: Vec<_> = hit
        .into_stream()
        .unwrap()
        .map(|c| c.unwrap())
        .collect()
        .await;
    assert_eq!(chunks.len(), 3);
    let text: String = chunks.iter().map(|c| c.delta_content()).collect();
    assert_eq!(text, "four");
    assert!(chunks[2].cache_hit);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn live_stream_is_forwarded_before_it_ends() {
    let cache = memory_cache();
    let (backend, tx) = FakeChat::channel();
    let chat = ChatCompletion::new(Arc::new(backend));
    let req = request("count").stream(true);

    let mut stream = chat
        .create(req.clone(), options(&cache))
        .await
        .unwrap()
        .into_stream()
        .unwrap();

    tx.unbounded_send(Ok(text_chunk("one "))).unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap().delta_content(), "one ");
    tx.unbounded_send(Ok(text_chunk("two"))).unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap().delta_content(), "two");

    // upstream still open: nothing stored yet
    let key = serde_json::to_value(&req).unwrap();
    assert_eq!(cache.search(&key).await.unwrap(), None);

    drop(tx);
    assert!(stream.next().await.is_none());
    assert_eq!(
        cache.search(&key).await.unwrap(),
        Some(CanonicalAnswer::text("one two"))
    );
}

#[tokio::test]
async fn abandoned_stream_stores_nothing() {
    let cache = memory_cache();
    let backend = Arc::new(FakeChat::replying("a long streamed answer"));
    let chat = ChatCompletion::new(backend.clone());

    let mut stream = chat
        .create(request("q").stream(true), options(&cache))
        .await
        .unwrap()
        .into_stream()
        .unwrap();
    stream.next().await.unwrap().unwrap();
    drop(stream);

    assert_eq!(cache.len().await.unwrap(), 0);
    chat.create(request("q").stream(true), options(&cache))
        .await
        .unwrap();
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn stream_with_an_error_is_not_stored() {
    let cache = memory_cache();
    let (backend, tx) = FakeChat::channel();
    let chat = ChatCompletion::new(Arc::new(backend));

    let mut stream = chat
        .create(request("q").stream(true), options(&cache))
        .await
        .unwrap()
        .into_stream()
        .unwrap();
    tx.unbounded_send(Ok(text_chunk("partial"))).unwrap();
    tx.unbounded_send(Err(Error::invalid_argument("connection reset")))
        .unwrap();
    drop(tx);

    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.unwrap().is_err());
    assert!(stream.next().await.is_none());
    assert_eq!(cache.len().await.unwrap(), 0);
}

#[tokio::test]
async fn backend_failures_become_backend_errors() {
    let cache = memory_cache();
    let chat = ChatCompletion::new(Arc::new(FakeChat::failing("rate limit reached")));
    let err = chat
        .create(request("q"), options(&cache))
        .await
        .unwrap_err();
    assert!(err.is_backend());
    assert!(err.to_string().contains("rate limit reached"));
    assert_eq!(cache.len().await.unwrap(), 0);
}

#[tokio::test]
async fn cache_skip_always_calls_the_backend() {
    let cache = memory_cache();
    let backend = Arc::new(FakeChat::replying("x"));
    let chat = ChatCompletion::new(backend.clone());
    for _ in 0..2 {
        chat.create(request("q"), options(&cache).skip(true))
            .await
            .unwrap();
    }
    assert_eq!(backend.calls(), 2);
    assert_eq!(cache.len().await.unwrap(), 0);
}

#[tokio::test]
async fn per_call_backend_override() {
    let cache = memory_cache();
    let configured = Arc::new(FakeChat::replying("configured"));
    let override_llm = FakeChat::replying("override");
    let chat = ChatCompletion::new(configured.clone());

    let resp = chat
        .create_with_llm(request("q"), options(&cache), Some(&override_llm))
        .await
        .unwrap()
        .into_completion()
        .unwrap();
    assert_eq!(resp.first_content(), Some("override"));
    assert_eq!(override_llm.calls(), 1);
    assert_eq!(configured.calls(), 0);
}

struct Tally(AtomicUsize);

impl TokenCounter for Tally {
    fn count(&self, text: &str) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst);
        text.chars().count()
    }
}

#[tokio::test]
async fn token_accounting_follows_the_cache_config() {
    for enabled in [true, false] {
        let cache = common::cache_with(CacheConfig::new().with_token_counter(enabled));
        let tally = Arc::new(Tally(AtomicUsize::new(0)));
        let chat = ChatCompletion::new(Arc::new(FakeChat::replying("hello")))
            .with_token_counter(tally.clone());

        chat.create(request("hi"), options(&cache)).await.unwrap();
        let hit = chat
            .create(request("hi"), options(&cache))
            .await
            .unwrap()
            .into_completion()
            .unwrap();

        let cost = hit.token_cost.unwrap();
        if enabled {
            // system: 3 + 6 + 8, user: 3 + 4 + 2, priming: 3
            assert_eq!(cost, TokenCost::new(29, 5));
        } else {
            assert_eq!(cost, TokenCost::default());
            assert_eq!(tally.0.load(Ordering::SeqCst), 0);
        }
    }
}
