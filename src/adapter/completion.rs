//! Cached text completions.

use crate::backend::{CompletionBackend, OpenAiClient};
use crate::cache::{adapt, CacheOptions};
use crate::error::wrap_error;
use crate::types::{
    unix_now, CanonicalAnswer, CompletionChoice, CompletionRequest, CompletionResponse, Usage,
};
use crate::Result;
use serde_json::Map;
use std::sync::Arc;

pub const TEXT_COMPLETION_OBJECT: &str = "text_completion";

pub struct Completion {
    backend: Arc<dyn CompletionBackend>,
}

impl Completion {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Arc::new(OpenAiClient::builder().build()?)))
    }

    pub async fn create(
        &self,
        request: CompletionRequest,
        options: CacheOptions,
    ) -> Result<CompletionResponse> {
        self.create_with_llm(request, options, None).await
    }

    pub async fn create_with_llm(
        &self,
        request: CompletionRequest,
        options: CacheOptions,
        llm: Option<&dyn CompletionBackend>,
    ) -> Result<CompletionResponse> {
        let backend = llm.unwrap_or(self.backend.as_ref());
        let cache_request = serde_json::to_value(&request)?;
        let req = &request;

        adapt(
            cache_request,
            &options,
            move || async move { backend.complete(req).await.map_err(wrap_error) },
            |answer| Ok(completion_from_cache(answer.into_text())),
            |live, writer| async move {
                match answer_from_completion(&live) {
                    Some(answer) => writer.save(answer).await,
                    None => tracing::debug!("completion has no choices, not cached"),
                }
                Ok(live)
            },
        )
        .await
    }
}

pub fn answer_from_completion(response: &CompletionResponse) -> Option<CanonicalAnswer> {
    response.first_text().map(CanonicalAnswer::text)
}

pub fn completion_from_cache(text: String) -> CompletionResponse {
    CompletionResponse {
        id: None,
        object: TEXT_COMPLETION_OBJECT.to_string(),
        created: unix_now(),
        model: None,
        choices: vec![CompletionChoice {
            text,
            index: 0,
            finish_reason: Some("stop".to_string()),
            extra: Map::new(),
        }],
        usage: Some(Usage::default()),
        cache_hit: true,
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_completion_shape() {
        let resp = completion_from_cache("four".into());
        assert_eq!(resp.object, "text_completion");
        assert!(resp.cache_hit);
        assert_eq!(resp.first_text(), Some("four"));
        assert_eq!(resp.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage, Some(Usage::default()));
    }

    #[test]
    fn empty_choices_yield_nothing_to_store() {
        let mut resp = completion_from_cache(String::new());
        resp.choices.clear();
        assert_eq!(answer_from_completion(&resp), None);
    }
}
