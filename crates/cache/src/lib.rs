//! # tessera-cache
//!
//! In-process result cache for tessera repositories.
//!
//! Entries are keyed by the entity type and a deterministic serialization of
//! the filter that produced them. Writes keep the cache coherent: inserts and
//! deletes purge a whole type bucket, edits replace matching elements in place.
//!
//! ```rust
//! use std::any::TypeId;
//! use serde_json::json;
//! use tessera_cache::{CacheConfig, CacheKey, ResultCache};
//!
//! struct Customer;
//!
//! let cache = ResultCache::new(CacheConfig::default());
//! let key = CacheKey::for_filter(TypeId::of::<Customer>(), &json!({"id": 7})).unwrap();
//!
//! cache.put(key.clone(), json!([{"id": 7, "name": "ada"}]), Some("id"));
//! assert_eq!(cache.get(&key), Some(json!({"id": 7, "name": "ada"})));
//! ```

use std::any::TypeId;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use thiserror::Error;

pub mod config;
pub mod store;

pub use config::*;
pub use store::*;

/// Cache operation errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache configuration error: {0}")]
    Configuration(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Identity of a cached result: the entity type plus the filter fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    bucket: TypeId,
    fingerprint: String,
}

impl CacheKey {
    pub fn new(bucket: TypeId, fingerprint: impl Into<String>) -> Self {
        Self {
            bucket,
            fingerprint: fingerprint.into(),
        }
    }

    /// Build a key from any serializable filter. Map-backed filters serialize
    /// with sorted keys, so equal filters always produce equal fingerprints.
    pub fn for_filter<F: Serialize + ?Sized>(bucket: TypeId, filter: &F) -> CacheResult<Self> {
        Ok(Self::new(bucket, serde_json::to_string(filter)?))
    }

    pub fn bucket(&self) -> TypeId {
        self.bucket
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub flushes: u64,
    pub total_keys: u64,
    pub memory_usage: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

static SHARED_CACHE: OnceLock<Arc<ResultCache>> = OnceLock::new();

/// Process-wide result cache, created with the default configuration on first use
pub fn shared_cache() -> Arc<ResultCache> {
    Arc::clone(SHARED_CACHE.get_or_init(|| Arc::new(ResultCache::new(CacheConfig::default()))))
}

/// Install the process-wide cache with a custom configuration.
///
/// Fails once the shared cache has been created.
pub fn init_shared_cache(config: CacheConfig) -> CacheResult<Arc<ResultCache>> {
    SHARED_CACHE
        .set(Arc::new(ResultCache::new(config)))
        .map_err(|_| CacheError::Configuration("shared cache already initialized".to_string()))?;
    Ok(shared_cache())
}
