//! Canonical cache answers and token cost.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// What a stored answer represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Text,
    ImageBase64,
    ImageUrl,
}

/// Raw payload of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerContent {
    Text(String),
    Bytes(Bytes),
}

/// The unit of cache storage: one normalized answer per call.
///
/// Built either by an extractor from a live response or by the cache when it
/// reads an entry back. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAnswer {
    content: AnswerContent,
    kind: AnswerKind,
}

impl CanonicalAnswer {
    pub fn new(content: AnswerContent, kind: AnswerKind) -> Self {
        Self { content, kind }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(AnswerContent::Text(text.into()), AnswerKind::Text)
    }

    /// Base64 image payload, kept in its byte form.
    pub fn image_base64(encoded: impl Into<Bytes>) -> Self {
        Self::new(AnswerContent::Bytes(encoded.into()), AnswerKind::ImageBase64)
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::new(AnswerContent::Text(url.into()), AnswerKind::ImageUrl)
    }

    pub fn kind(&self) -> AnswerKind {
        self.kind
    }

    pub fn content(&self) -> &AnswerContent {
        &self.content
    }

    /// Payload as bytes, whatever form it was stored in.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.content {
            AnswerContent::Text(s) => s.as_bytes(),
            AnswerContent::Bytes(b) => b,
        }
    }

    /// Payload as text. Byte payloads are decoded lossily.
    pub fn to_text(&self) -> String {
        match &self.content {
            AnswerContent::Text(s) => s.clone(),
            AnswerContent::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    pub fn into_text(self) -> String {
        match self.content {
            AnswerContent::Text(s) => s,
            AnswerContent::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
        }
    }
}

/// Tokens a cache hit saved: what the prompt and the answer would have cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCost {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenCost {
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}
