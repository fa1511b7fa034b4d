//! Cache configuration, the orchestration seam, and the exact-match default.

use super::backend::{CacheBackend, MemoryCache};
use super::key::{CacheKey, CacheKeyGenerator};
use crate::types::CanonicalAnswer;
use crate::Result;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Report the tokens a chat cache hit saved.
    pub enable_token_counter: bool,
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,
    pub max_entry_size: usize,
    pub key_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enable_token_counter: true,
            default_ttl: Duration::from_secs(3600),
            max_entry_size: 10 * 1024 * 1024,
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_token_counter(mut self, enabled: bool) -> Self {
        self.enable_token_counter = enabled;
        self
    }
    pub fn with_max_entry_size(mut self, bytes: usize) -> Self {
        self.max_entry_size = bytes;
        self
    }
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// The orchestration core as seen from the adapters: lookup and storage of
/// canonical answers for a request.
///
/// Similarity evaluation, eviction and persistence all live behind this trait.
/// Implementations are expected to serialize concurrent access per key.
#[async_trait]
pub trait CacheCore: Send + Sync {
    fn config(&self) -> &CacheConfig;

    /// Find a stored answer for `request`.
    async fn search(&self, request: &Value) -> Result<Option<CanonicalAnswer>>;

    /// Store `answer` as the result of `request`.
    async fn save(&self, request: &Value, answer: &CanonicalAnswer) -> Result<()>;

    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Exact-match orchestration over any [`CacheBackend`]: a request hits only
/// if an identical request (modulo ignored fields) was stored before.
pub struct ExactMatchCache {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    keys: CacheKeyGenerator,
    stats: AtomicStats,
}

impl ExactMatchCache {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            keys: CacheKeyGenerator::new(),
            stats: AtomicStats::default(),
        }
    }

    /// In-memory cache holding up to `max_entries` answers.
    pub fn in_memory(config: CacheConfig, max_entries: usize) -> Self {
        Self::new(config, Box::new(MemoryCache::new(max_entries)))
    }

    pub fn with_key_generator(mut self, keys: CacheKeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn len(&self) -> Result<usize> {
        self.backend.len().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.backend.clear().await
    }

    fn key_for(&self, request: &Value) -> CacheKey {
        let key = self.keys.generate(request);
        match self.config.key_prefix {
            Some(ref p) => CacheKey {
                hash: format!("{}:{}", p, key.hash),
                model: key.model,
            },
            None => key,
        }
    }
}

#[async_trait]
impl CacheCore for ExactMatchCache {
    fn config(&self) -> &CacheConfig {
        &self.config
    }

    async fn search(&self, request: &Value) -> Result<Option<CanonicalAnswer>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let key = self.key_for(request);
        match self.backend.get(&key).await {
            Ok(Some(data)) => match serde_json::from_slice(&data) {
                Ok(answer) => {
                    tracing::trace!(key = %key, model = key.model.as_deref(), "entry found");
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(answer))
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "discarding undecodable cache entry");
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    async fn save(&self, request: &Value, answer: &CanonicalAnswer) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let data = serde_json::to_vec(answer)?;
        if data.len() > self.config.max_entry_size {
            tracing::debug!(size = data.len(), "answer exceeds max_entry_size, not cached");
            return Ok(());
        }
        let key = self.key_for(request);
        match self
            .backend
            .set(&key, &data, self.config.default_ttl)
            .await
        {
            Ok(()) => {
                tracing::trace!(key = %key, model = key.model.as_deref(), size = data.len(), "entry written");
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "exact_match"
    }
}

static DEFAULT_CACHE: Lazy<ArcSwap<Arc<dyn CacheCore>>> = Lazy::new(|| {
    let cache: Arc<dyn CacheCore> = Arc::new(ExactMatchCache::in_memory(CacheConfig::default(), 1000));
    ArcSwap::from_pointee(cache)
});

/// Process-wide cache used when a call does not pass its own.
pub fn default_cache() -> Arc<dyn CacheCore> {
    let current = DEFAULT_CACHE.load();
    Arc::clone(&**current)
}

/// Replace the process-wide default cache.
pub fn set_default_cache(cache: Arc<dyn CacheCore>) {
    DEFAULT_CACHE.store(Arc::new(cache));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NullCache;
    use serde_json::json;

    #[tokio::test]
    async fn save_then_search_hits() {
        let cache = ExactMatchCache::in_memory(CacheConfig::default(), 10);
        let req = json!({"model": "m", "prompt": "p"});
        assert_eq!(cache.search(&req).await.unwrap(), None);
        cache
            .save(&req, &CanonicalAnswer::text("answer"))
            .await
            .unwrap();
        assert_eq!(
            cache.search(&req).await.unwrap(),
            Some(CanonicalAnswer::text("answer"))
        );
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.sets), (1, 1, 1));
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn disabled_cache_neither_reads_nor_writes() {
        let cache = ExactMatchCache::in_memory(CacheConfig::new().with_enabled(false), 10);
        let req = json!({"prompt": "p"});
        cache.save(&req, &CanonicalAnswer::text("a")).await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 0);
        assert_eq!(cache.search(&req).await.unwrap(), None);
    }

    #[tokio::test]
    async fn oversized_answers_are_skipped() {
        let cache = ExactMatchCache::in_memory(CacheConfig::new().with_max_entry_size(8), 10);
        let req = json!({"prompt": "p"});
        cache
            .save(&req, &CanonicalAnswer::text("far too long for eight bytes"))
            .await
            .unwrap();
        assert_eq!(cache.search(&req).await.unwrap(), None);
    }

    #[tokio::test]
    async fn key_prefix_is_applied() {
        let cache = ExactMatchCache::new(
            CacheConfig::new().with_key_prefix("tenant"),
            Box::new(NullCache::new()),
        );
        let key = cache.key_for(&json!({"prompt": "p"}));
        assert!(key.hash.starts_with("tenant:"));
        assert_eq!(cache.backend_name(), "null");
    }

    #[test]
    fn config_reads_from_yaml() {
        let cfg: CacheConfig =
            serde_yaml::from_str("enable_token_counter: false\ndefault_ttl: 60\n").unwrap();
        assert!(cfg.enabled);
        assert!(!cfg.enable_token_counter);
        assert_eq!(cfg.default_ttl, Duration::from_secs(60));
    }
}
