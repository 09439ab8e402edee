//! Shared Cache (component A): a process-crossing key/value store with TTL,
//! atomic set-if-absent, hash fields, and set members.
//!
//! `CacheBackend` is the abstract capability spec.md describes — "not a
//! particular product". `RedisCache` is the production backend;
//! `MemoryCache` backs tests and single-process demos. Both implement the
//! same trait so every other component (coordination, ingest, bucket
//! engines, API) is backend-agnostic.

pub mod memory;
pub mod redis_backend;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FabricError, FabricResult};

pub use memory::MemoryCache;
pub use redis_backend::RedisCache;

/// Core cache backend trait for both the production and in-memory caches.
///
/// Implementations must be `Send + Sync` to support concurrent access from
/// many worker tasks and API handlers at once. Every operation here maps
/// directly onto spec.md §4.1.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> FabricResult<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> FabricResult<()>;
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> FabricResult<bool>;
    async fn delete(&self, key: &str) -> FabricResult<()>;
    async fn expire(&self, key: &str, ttl: Duration) -> FabricResult<()>;

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> FabricResult<()>;
    async fn hget(&self, key: &str, field: &str) -> FabricResult<Option<Vec<u8>>>;
    async fn hgetall(&self, key: &str) -> FabricResult<HashMap<String, Vec<u8>>>;
    async fn hdel(&self, key: &str, field: &str) -> FabricResult<()>;

    async fn sadd(&self, key: &str, member: &str) -> FabricResult<()>;
    async fn srem(&self, key: &str, member: &str) -> FabricResult<()>;
    async fn sismember(&self, key: &str, member: &str) -> FabricResult<bool>;
    async fn smembers(&self, key: &str) -> FabricResult<Vec<String>>;

    /// Bounded-batch key enumeration. `cursor` is backend-defined; callers
    /// loop until the returned cursor is `0`/empty.
    async fn scan(&self, prefix: &str, batch: usize) -> FabricResult<Vec<String>>;

    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Typed facade over a `CacheBackend` so callers never hand-roll
/// `serde_json::to_vec`/`from_slice` at every call site.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    pub async fn get_bytes(&self, key: &str) -> FabricResult<Option<Vec<u8>>> {
        self.backend.get(key).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> FabricResult<Option<T>> {
        match self.backend.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> FabricResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.set(key, &bytes, ttl).await
    }

    pub async fn set_bytes(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> FabricResult<()> {
        self.backend.set(key, value, ttl).await
    }

    pub async fn set_if_absent(&self, key: &str, owner: &str, ttl: Duration) -> FabricResult<bool> {
        self.backend.set_if_absent(key, owner.as_bytes(), ttl).await
    }

    pub async fn delete(&self, key: &str) -> FabricResult<()> {
        self.backend.delete(key).await
    }

    pub async fn hset_json<T: Serialize>(&self, key: &str, field: &str, value: &T) -> FabricResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.hset(key, field, &bytes).await
    }

    pub async fn hgetall_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> FabricResult<HashMap<String, T>> {
        let raw = self.backend.hgetall(key).await?;
        let mut out = HashMap::with_capacity(raw.len());
        for (field, bytes) in raw {
            match serde_json::from_slice::<T>(&bytes) {
                Ok(v) => {
                    out.insert(field, v);
                }
                Err(e) => return Err(FabricError::Malformed(e.to_string())),
            }
        }
        Ok(out)
    }
}
