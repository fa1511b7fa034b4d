//! Token counter implementations.

use crate::types::message::{string_values, MessageContent};
use crate::types::Message;
use crate::{Error, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Tokens charged for every message, whatever its content.
pub const TOKENS_PER_MESSAGE: usize = 3;
/// Extra token charged when a message carries a `name`.
pub const TOKENS_PER_NAME: usize = 1;
/// Every reply is primed with `<|start|>assistant<|message|>`.
pub const REPLY_PRIMING_TOKENS: usize = 3;

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Prompt tokens for a chat message list, following the chat protocol's
    /// accounting convention. Every string value of a message is counted,
    /// including content parts and fields such as `tool_call_id`.
    fn count_messages(&self, messages: &[Message]) -> usize {
        let mut total = 0;
        for message in messages {
            total += TOKENS_PER_MESSAGE;
            total += self.count(message.role.as_str());
            let mut values = Vec::new();
            match &message.content {
                Some(MessageContent::Text(text)) => values.push(text.as_str()),
                Some(MessageContent::Parts(parts)) => {
                    parts.iter().for_each(|p| string_values(p, &mut values))
                }
                None => {}
            }
            message.extra.values().for_each(|v| string_values(v, &mut values));
            total += values.into_iter().map(|v| self.count(v)).sum::<usize>();
            if let Some(name) = &message.name {
                total += self.count(name);
                total += TOKENS_PER_NAME;
            }
        }
        total + REPLY_PRIMING_TOKENS
    }
}

#[derive(Debug, Clone)]
pub struct CharacterEstimator {
    chars_per_token: f64,
}
impl CharacterEstimator {
    pub fn new() -> Self {
        Self::with_ratio(4.0)
    }
    pub fn with_ratio(r: f64) -> Self {
        Self { chars_per_token: r }
    }
}
impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new()
    }
}
impl TokenCounter for CharacterEstimator {
    fn count(&self, text: &str) -> usize {
        (text.len() as f64 / self.chars_per_token).ceil() as usize
    }
}

/// Exact counts with the `cl100k_base` encoding used by the gpt-3.5 and
/// gpt-4 chat models.
pub struct Cl100kCounter {
    bpe: tiktoken_rs::CoreBPE,
}

impl Cl100kCounter {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| Error::configuration(format!("cl100k tokenizer unavailable: {}", e)))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for Cl100kCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Memoizes counts of an inner counter; useful when the same system prompt is
/// counted on every cache hit.
pub struct CachingCounter {
    inner: Box<dyn TokenCounter>,
    cache: Mutex<LruCache<String, usize>>,
}
impl CachingCounter {
    pub fn new(inner: Box<dyn TokenCounter>, max_size: usize) -> Self {
        let cap = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(cap)),
        }
    }
    pub fn clear_cache(&self) {
        if let Ok(mut c) = self.cache.lock() {
            c.clear();
        }
    }
    pub fn cached_entries(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}
impl TokenCounter for CachingCounter {
    fn count(&self, text: &str) -> usize {
        if let Ok(mut c) = self.cache.lock() {
            if let Some(&n) = c.get(text) {
                return n;
            }
        }
        let n = self.inner.count(text);
        if let Ok(mut c) = self.cache.lock() {
            c.put(text.to_string(), n);
        }
        n
    }
}
