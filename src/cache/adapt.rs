//! The call contract every modality adapter goes through.

use super::manager::{default_cache, CacheCore};
use crate::types::CanonicalAnswer;
use crate::Result;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache routing for a single call; passed through to the orchestration
/// untouched.
#[derive(Clone, Default)]
pub struct CacheOptions {
    /// Cache to use instead of the process-wide default.
    pub cache_obj: Option<Arc<dyn CacheCore>>,
    /// Bypass the cache entirely: no lookup, no store.
    pub cache_skip: bool,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheCore>) -> Self {
        self.cache_obj = Some(cache);
        self
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.cache_skip = skip;
        self
    }

    /// The cache this call will use.
    pub fn cache(&self) -> Arc<dyn CacheCore> {
        self.cache_obj.clone().unwrap_or_else(default_cache)
    }
}

impl std::fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOptions")
            .field("cache_obj", &self.cache_obj.as_ref().map(|c| c.name()))
            .field("cache_skip", &self.cache_skip)
            .finish()
    }
}

/// One-shot storage hook handed to an update callback.
///
/// Consuming `save` guarantees at most one store per call; dropping the
/// writer stores nothing.
pub struct CacheWriter {
    cache: Arc<dyn CacheCore>,
    request: Value,
}

impl CacheWriter {
    pub fn new(cache: Arc<dyn CacheCore>, request: Value) -> Self {
        Self { cache, request }
    }

    /// Store `answer`. A failing store is logged; the live response the
    /// caller already holds stays valid.
    pub async fn save(self, answer: CanonicalAnswer) {
        match self.cache.save(&self.request, &answer).await {
            Ok(()) => debug!(cache = self.cache.name(), kind = ?answer.kind(), "answer stored"),
            Err(e) => warn!(cache = self.cache.name(), error = %e, "failed to save the answer to cache"),
        }
    }
}

impl std::fmt::Debug for CacheWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWriter")
            .field("cache", &self.cache.name())
            .finish_non_exhaustive()
    }
}

/// Serve one call from the cache or from the live backend.
///
/// * `request` identifies the call for lookup and storage.
/// * `llm_handler` performs the live call; its errors are already normalized.
/// * `cache_response_builder` turns a stored answer into the response shape.
/// * `update_cache_callback` extracts an answer from the live response, hands
///   it to the [`CacheWriter`] and returns the live response unchanged.
///
/// With `cache_skip` set, or the cache disabled, only `llm_handler` runs.
pub async fn adapt<R, H, HF, B, U, UF>(
    request: Value,
    options: &CacheOptions,
    llm_handler: H,
    cache_response_builder: B,
    update_cache_callback: U,
) -> Result<R>
where
    H: FnOnce() -> HF,
    HF: Future<Output = Result<R>>,
    B: FnOnce(CanonicalAnswer) -> Result<R>,
    U: FnOnce(R, CacheWriter) -> UF,
    UF: Future<Output = Result<R>>,
{
    let cache = options.cache();
    if options.cache_skip || !cache.config().enabled {
        debug!(cache = cache.name(), skip = options.cache_skip, "cache bypassed");
        return llm_handler().await;
    }

    if let Some(answer) = cache.search(&request).await? {
        debug!(cache = cache.name(), kind = ?answer.kind(), "cache hit");
        return cache_response_builder(answer);
    }

    debug!(cache = cache.name(), "cache miss");
    let live = llm_handler().await?;
    update_cache_callback(live, CacheWriter::new(cache, request)).await
}
