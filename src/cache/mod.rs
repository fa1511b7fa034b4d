//! 缓存编排模块：缓存查找/存储接口与默认的精确匹配实现。
//!
//! # Cache Orchestration Module
//!
//! The adapters never decide on their own whether a call is served from the
//! cache. They hand three callables to [`adapt`], which consults a
//! [`CacheCore`] and runs the live call, the response builder, or the update
//! callback accordingly.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`adapt`] | The call contract shared by every modality |
//! | [`CacheOptions`] | Per-call routing (`cache_obj`, `cache_skip`) |
//! | [`CacheWriter`] | One-shot storage hook given to update callbacks |
//! | [`CacheCore`] | Lookup/storage seam for the orchestration core |
//! | [`ExactMatchCache`] | Default core: exact request-hash matching |
//! | [`CacheBackend`] | Byte storage trait ([`MemoryCache`], [`NullCache`]) |
//! | [`CacheKeyGenerator`] | Request hashing |
//!
//! ## Example
//!
//! ```rust
//! use llm_cache_adapter::cache::{CacheConfig, CacheOptions, ExactMatchCache};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let cache = ExactMatchCache::in_memory(
//!     CacheConfig::new().with_ttl(Duration::from_secs(600)),
//!     1000,
//! );
//! let options = CacheOptions::new().with_cache(Arc::new(cache));
//! assert!(!options.cache_skip);
//! ```

mod adapt;
mod backend;
mod key;
mod manager;

pub use adapt::{adapt, CacheOptions, CacheWriter};
pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use key::{CacheKey, CacheKeyGenerator};
pub use manager::{
    default_cache, set_default_cache, CacheConfig, CacheCore, CacheStats, ExactMatchCache,
};
