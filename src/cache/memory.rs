//! In-process `CacheBackend` used by tests and single-process demos.
//!
//! Grounded in the teacher's `CachingDataSource` (TTL-tagged entries behind
//! a shared map), generalized from a single `Transaction` value type to
//! opaque bytes plus hash/set structures, and from `RwLock<HashMap>` to
//! `dashmap::DashMap` for lock-free per-key concurrency.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::CacheBackend;
use crate::error::FabricResult;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }
}

#[derive(Default)]
pub struct MemoryCache {
    kv: DashMap<String, Entry>,
    hashes: DashMap<String, HashMap<String, Vec<u8>>>,
    sets: DashMap<String, std::collections::HashSet<String>>,
}

impl MemoryCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> FabricResult<Option<Vec<u8>>> {
        let live_value = match self.kv.get(key) {
            Some(entry) if entry.is_live() => Some(Some(entry.value.clone())),
            Some(_) => None,
            None => Some(None),
        };
        match live_value {
            Some(value) => Ok(value),
            None => {
                self.kv.remove(key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> FabricResult<()> {
        self.kv.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> FabricResult<bool> {
        let mut inserted = false;
        self.kv
            .entry(key.to_string())
            .and_modify(|e| {
                if !e.is_live() {
                    *e = Entry {
                        value: value.to_vec(),
                        expires_at: Some(Instant::now() + ttl),
                    };
                    inserted = true;
                }
            })
            .or_insert_with(|| {
                inserted = true;
                Entry {
                    value: value.to_vec(),
                    expires_at: Some(Instant::now() + ttl),
                }
            });
        Ok(inserted)
    }

    async fn delete(&self, key: &str) -> FabricResult<()> {
        self.kv.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> FabricResult<()> {
        if let Some(mut entry) = self.kv.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> FabricResult<()> {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_vec());
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> FabricResult<Option<Vec<u8>>> {
        Ok(self
            .hashes
            .get(key)
            .and_then(|m| m.get(field).cloned()))
    }

    async fn hgetall(&self, key: &str) -> FabricResult<HashMap<String, Vec<u8>>> {
        Ok(self.hashes.get(key).map(|m| m.clone()).unwrap_or_default())
    }

    async fn hdel(&self, key: &str, field: &str) -> FabricResult<()> {
        if let Some(mut m) = self.hashes.get_mut(key) {
            m.remove(field);
        }
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> FabricResult<()> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> FabricResult<()> {
        if let Some(mut s) = self.sets.get_mut(key) {
            s.remove(member);
        }
        Ok(())
    }

    async fn sismember(&self, key: &str, member: &str) -> FabricResult<bool> {
        Ok(self
            .sets
            .get(key)
            .map(|s| s.contains(member))
            .unwrap_or(false))
    }

    async fn smembers(&self, key: &str) -> FabricResult<Vec<String>> {
        Ok(self
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn scan(&self, prefix: &str, batch: usize) -> FabricResult<Vec<String>> {
        Ok(self
            .kv
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().is_live())
            .map(|e| e.key().clone())
            .take(batch)
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_is_atomic_per_key() {
        let cache = MemoryCache::new();
        assert!(cache
            .set_if_absent("lock", b"owner-a", Duration::from_secs(10))
            .await
            .unwrap());
        assert!(!cache
            .set_if_absent("lock", b"owner-b", Duration::from_secs(10))
            .await
            .unwrap());
        assert_eq!(cache.get("lock").await.unwrap().unwrap(), b"owner-a");
    }

    #[tokio::test]
    async fn expired_entry_is_treated_as_absent() {
        let cache = MemoryCache::new();
        cache
            .set("k", b"v", Some(Duration::from_millis(5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hash_and_set_ops_roundtrip() {
        let cache = MemoryCache::new();
        cache.hset("h", "f1", b"v1").await.unwrap();
        cache.hset("h", "f2", b"v2").await.unwrap();
        let all = cache.hgetall("h").await.unwrap();
        assert_eq!(all.len(), 2);
        cache.hdel("h", "f1").await.unwrap();
        assert_eq!(cache.hgetall("h").await.unwrap().len(), 1);

        cache.sadd("s", "a").await.unwrap();
        cache.sadd("s", "b").await.unwrap();
        assert!(cache.sismember("s", "a").await.unwrap());
        cache.srem("s", "a").await.unwrap();
        assert!(!cache.sismember("s", "a").await.unwrap());
        assert_eq!(cache.smembers("s").await.unwrap(), vec!["b".to_string()]);
    }
}
