//! Leader lease: `set_if_absent(lock_key, owner_id, ttl)` grants leadership
//! for `ttl`; the holder must renew before half the ttl elapses. Release is
//! only permitted when the stored owner still matches. A lost lease must
//! never be deleted by a non-owner — `release` checks ownership first.

use std::time::Duration;

use crate::cache::Cache;
use crate::error::FabricResult;

pub struct Lease {
    cache: Cache,
    lock_key: String,
    owner_id: String,
    ttl: Duration,
    held: bool,
}

impl Lease {
    pub fn new(cache: Cache, lock_key: impl Into<String>, owner_id: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache,
            lock_key: lock_key.into(),
            owner_id: owner_id.into(),
            ttl,
            held: false,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Attempt to become leader. Returns `true` on success.
    pub async fn try_acquire(&mut self) -> FabricResult<bool> {
        let acquired = self
            .cache
            .set_if_absent(&self.lock_key, &self.owner_id, self.ttl)
            .await?;
        self.held = acquired;
        Ok(acquired)
    }

    /// Renew the lease, but only while we are still the recorded owner.
    /// If another owner_id is present, the lease is lost: the caller must
    /// abort its critical section on the next check (spec.md §4.2).
    pub async fn renew(&mut self) -> FabricResult<bool> {
        let current = self.cache.backend().get(&self.lock_key).await?;
        match current {
            Some(bytes) if bytes == self.owner_id.as_bytes() => {
                self.cache
                    .backend()
                    .expire(&self.lock_key, self.ttl)
                    .await?;
                self.held = true;
                Ok(true)
            }
            _ => {
                self.held = false;
                Ok(false)
            }
        }
    }

    /// Check without renewing whether we still hold the lease.
    pub async fn is_lost(&self) -> FabricResult<bool> {
        let current = self.cache.backend().get(&self.lock_key).await?;
        Ok(!matches!(current, Some(bytes) if bytes == self.owner_id.as_bytes()))
    }

    /// Release the lease. Never deletes a foreign lease: only deletes when
    /// the stored owner_id still matches ours.
    pub async fn release(&mut self) -> FabricResult<()> {
        let current = self.cache.backend().get(&self.lock_key).await?;
        if matches!(current, Some(bytes) if bytes == self.owner_id.as_bytes()) {
            self.cache.backend().delete(&self.lock_key).await?;
        }
        self.held = false;
        Ok(())
    }

    /// How long to sleep before the next renewal attempt (half the ttl).
    pub fn renew_interval(&self) -> Duration {
        self.ttl / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};

    fn cache() -> Cache {
        Cache::new(MemoryCache::new())
    }

    #[tokio::test]
    async fn second_acquirer_is_denied() {
        let cache = cache();
        let mut a = Lease::new(cache.clone(), "lock", "a", Duration::from_secs(5));
        let mut b = Lease::new(cache.clone(), "lock", "b", Duration::from_secs(5));
        assert!(a.try_acquire().await.unwrap());
        assert!(!b.try_acquire().await.unwrap());
    }

    #[tokio::test]
    async fn release_never_removes_foreign_lease() {
        let cache = cache();
        let mut a = Lease::new(cache.clone(), "lock", "a", Duration::from_millis(10));
        assert!(a.try_acquire().await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;

        let mut b = Lease::new(cache.clone(), "lock", "b", Duration::from_secs(5));
        assert!(b.try_acquire().await.unwrap());

        // a's lease expired and b took over; a releasing must not evict b.
        a.release().await.unwrap();
        assert!(!b.is_lost().await.unwrap());
    }

    #[tokio::test]
    async fn renew_fails_once_another_owner_holds_the_key() {
        let cache = cache();
        let mut a = Lease::new(cache.clone(), "lock", "a", Duration::from_millis(10));
        assert!(a.try_acquire().await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;

        let mut b = Lease::new(cache.clone(), "lock", "b", Duration::from_secs(5));
        assert!(b.try_acquire().await.unwrap());

        assert!(!a.renew().await.unwrap());
        assert!(a.is_lost().await.unwrap());
    }
}
