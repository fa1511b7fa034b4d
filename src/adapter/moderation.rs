//! Cached moderation with a result-count consistency check.

use crate::backend::{ModerationBackend, OpenAiClient};
use crate::cache::{adapt, CacheOptions};
use crate::error::wrap_error;
use crate::types::{CanonicalAnswer, ModerationRequest, ModerationResponse};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::sync::Arc;
use tracing::warn;

/// Moderation calls served from the cache when possible.
///
/// A batch answer found by similarity may belong to an input of a different
/// length. When the number of results does not match the number of inputs,
/// the call is repeated once with the cache bypassed, and that result is
/// returned as is.
pub struct Moderation {
    backend: Arc<dyn ModerationBackend>,
}

impl Moderation {
    pub fn new(backend: Arc<dyn ModerationBackend>) -> Self {
        Self { backend }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Arc::new(OpenAiClient::builder().build()?)))
    }

    pub async fn create(
        &self,
        request: ModerationRequest,
        options: CacheOptions,
    ) -> Result<ModerationResponse> {
        self.create_with_llm(request, options, None).await
    }

    pub async fn create_with_llm(
        &self,
        request: ModerationRequest,
        options: CacheOptions,
        llm: Option<&dyn ModerationBackend>,
    ) -> Result<ModerationResponse> {
        let backend = llm.unwrap_or(self.backend.as_ref());
        let expected = request.input.expected_results();

        let response = self.call(backend, &request, &options).await?;
        if response.results.len() == expected {
            return Ok(response);
        }

        warn!(
            expected,
            actual = response.results.len(),
            "moderation result count mismatch, retrying without cache"
        );
        let fresh = options.skip(true);
        self.call(backend, &request, &fresh).await
    }

    async fn call(
        &self,
        backend: &dyn ModerationBackend,
        request: &ModerationRequest,
        options: &CacheOptions,
    ) -> Result<ModerationResponse> {
        adapt(
            serde_json::to_value(request)?,
            options,
            move || async move { backend.moderate(request).await.map_err(wrap_error) },
            |answer| response_from_cache(&answer),
            |live, writer| async move {
                let answer = answer_from_response(&live)?;
                writer.save(answer).await;
                Ok::<_, Error>(live)
            },
        )
        .await
    }
}

/// Stored form of a moderation result: its JSON text, indented by four spaces.
pub fn answer_from_response(response: &ModerationResponse) -> Result<CanonicalAnswer> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    response.serialize(&mut ser)?;
    Ok(CanonicalAnswer::text(String::from_utf8_lossy(&buf).into_owned()))
}

/// Stored results are returned verbatim.
pub fn response_from_cache(answer: &CanonicalAnswer) -> Result<ModerationResponse> {
    Ok(serde_json::from_slice(answer.as_bytes())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_form_is_indented_json() {
        let response: ModerationResponse = serde_json::from_value(json!({
            "id": "modr-1",
            "model": "text-moderation-007",
            "results": [{"flagged": false, "categories": {"hate": false}, "category_scores": {"hate": 0.01}}]
        }))
        .unwrap();
        let answer = answer_from_response(&response).unwrap();
        assert!(answer.to_text().contains("\n    \"id\": \"modr-1\""));
        assert_eq!(response_from_cache(&answer).unwrap(), response);
    }
}
