//! Process Supervisor (component H), per spec.md §4.8: one OS process per
//! worker, a process-wide lock acquired at startup (abort if already held),
//! a background renewer at half the TTL, and SIGINT-triggered release.

use std::time::Duration;
use tracing::{error, info, warn};

use crate::cache::Cache;
use crate::coordination::Lease;

pub struct Supervisor {
    cache: Cache,
    lock_key: String,
    owner_id: String,
    ttl: Duration,
}

impl Supervisor {
    /// Acquires the process-wide lock or returns `Err` if another process
    /// already holds it — the caller should abort startup in that case.
    pub async fn acquire(
        cache: Cache,
        lock_key: impl Into<String>,
        owner_id: impl Into<String>,
        ttl: Duration,
    ) -> anyhow::Result<Self> {
        let lock_key = lock_key.into();
        let owner_id = owner_id.into();
        let mut lease = Lease::new(cache.clone(), lock_key.clone(), owner_id.clone(), ttl);
        if !lease.try_acquire().await.map_err(|e| anyhow::anyhow!("{e}"))? {
            anyhow::bail!("process-wide lock {lock_key} already held");
        }
        info!(lock_key = %lock_key, "acquired process-wide lock");
        Ok(Self {
            cache,
            lock_key,
            owner_id,
            ttl,
        })
    }

    fn lease(&self) -> Lease {
        Lease::new(self.cache.clone(), self.lock_key.clone(), self.owner_id.clone(), self.ttl)
    }

    /// Runs `body` to completion while the lease is renewed at half its TTL
    /// in the background. Returns `Err` (caller exits nonzero) if renewal
    /// ever fails. SIGINT releases the lease, if still owned, before
    /// returning.
    pub async fn run<F, Fut>(self, body: F) -> anyhow::Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let renew_interval = self.ttl / 2;
        let renewer_lease = self.lease();

        tokio::select! {
            _ = body() => {
                self.release_if_owned().await;
                Ok(())
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("received SIGINT, releasing process-wide lock");
                self.release_if_owned().await;
                Ok(())
            }
            renewal_result = Self::renew_loop(renewer_lease, renew_interval) => {
                match renewal_result {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        error!(error = %e, "lost process-wide lock, exiting");
                        Err(anyhow::anyhow!("lease renewal failed: {e}"))
                    }
                }
            }
        }
    }

    async fn renew_loop(mut lease: Lease, interval: Duration) -> anyhow::Result<()> {
        loop {
            tokio::time::sleep(interval).await;
            let renewed = lease.renew().await.map_err(|e| anyhow::anyhow!("{e}"))?;
            if !renewed {
                anyhow::bail!("another process now holds the lock");
            }
        }
    }

    async fn release_if_owned(&self) {
        let mut lease = self.lease();
        if let Err(e) = lease.release().await {
            warn!(error = %e, "failed to release process-wide lock on shutdown");
        }
    }
}
