//! Token 计数模块：为缓存命中计算节省的 Token 数。
//!
//! # Token Accounting Module
//!
//! Counts the tokens a cache hit saved: the prompt side uses the chat
//! protocol's per-message convention, the answer side counts the cached text.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TokenCounter`] | Tokenizer seam; `count_messages` implements the prompt formula |
//! | [`Cl100kCounter`] | Exact `cl100k_base` counts via `tiktoken-rs`; the adapters' default |
//! | [`CharacterEstimator`] | Fast character-based approximation (4 chars ≈ 1 token) |
//! | [`CachingCounter`] | LRU-memoizing wrapper around another counter |
//! | [`saved_tokens`] | Builds the [`TokenCost`] attached to cached chat responses |
//!
//! ## Example
//!
//! ```rust
//! use llm_cache_adapter::tokens::{saved_tokens, CharacterEstimator, TokenCounter};
//! use llm_cache_adapter::types::Message;
//!
//! let counter = CharacterEstimator::new();
//! let cost = saved_tokens(true, &counter, &[Message::user("hi")], "hello");
//! assert_eq!(cost.input_tokens, counter.count_messages(&[Message::user("hi")]));
//! assert_eq!(cost.output_tokens, 2);
//! ```

mod counter;

pub use counter::{
    CachingCounter, CharacterEstimator, Cl100kCounter, TokenCounter, REPLY_PRIMING_TOKENS,
    TOKENS_PER_MESSAGE, TOKENS_PER_NAME,
};

use crate::types::{Message, TokenCost};
use once_cell::sync::Lazy;
use std::sync::Arc;

static DEFAULT_COUNTER: Lazy<Arc<dyn TokenCounter>> = Lazy::new(|| match Cl100kCounter::new() {
    Ok(counter) => Arc::new(counter),
    Err(e) => {
        tracing::warn!(error = %e, "falling back to character-based token estimates");
        Arc::new(CharacterEstimator::new())
    }
});

/// Shared `cl100k_base` counter, loaded once. Falls back to
/// [`CharacterEstimator`] if the encoding cannot be loaded.
pub fn default_counter() -> Arc<dyn TokenCounter> {
    DEFAULT_COUNTER.clone()
}

/// Token cost of serving `answer` for `messages` from the cache.
///
/// With accounting disabled this is `{0, 0}` and the tokenizer is not called.
pub fn saved_tokens(
    enabled: bool,
    counter: &dyn TokenCounter,
    messages: &[Message],
    answer: &str,
) -> TokenCost {
    if !enabled {
        return TokenCost::default();
    }
    TokenCost::new(counter.count_messages(messages), counter.count(answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tally(AtomicUsize);
    impl TokenCounter for Tally {
        fn count(&self, text: &str) -> usize {
            self.0.fetch_add(1, Ordering::SeqCst);
            text.len()
        }
    }

    #[test]
    fn disabled_accounting_never_tokenizes() {
        let tally = Tally(AtomicUsize::new(0));
        let cost = saved_tokens(false, &tally, &[Message::user("hello there")], "long answer");
        assert_eq!(cost, TokenCost::default());
        assert_eq!(tally.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn default_counter_is_shared_and_exact() {
        let a = default_counter();
        assert!(Arc::ptr_eq(&a, &default_counter()));
        assert_eq!(a.count("hello world"), 2);
    }

    #[test]
    fn enabled_accounting_counts_both_sides() {
        let tally = Tally(AtomicUsize::new(0));
        let cost = saved_tokens(true, &tally, &[Message::user("hi")], "hello");
        assert_eq!(cost.input_tokens, 3 + 4 + 2 + 3);
        assert_eq!(cost.output_tokens, 5);
        assert_eq!(cost.total(), 17);
    }
}
