//! Network ingest worker, per spec.md §4.3: every 10s, pulls
//! `getnetworkinfo` and publishes peer count and node version. The lightest
//! of the three node-polling workers — no static/dynamic split, since
//! spec.md treats peer count and version as a single view that simply
//! refreshes on its own cadence.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

use crate::cache::Cache;
use crate::coordination::Lease;
use crate::ingest::blockchain_worker::{now_ms, publish_stats, sleep_until_deadline};
use crate::ingest::rpc_client::BitcoinRpcClient;
use crate::keys;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDynamicView {
    pub connections: u64,
    pub connections_in: u64,
    pub connections_out: u64,
    pub subversion: String,
    pub protocol_version: u64,
    pub ingest_epoch_ms: u64,
}

pub struct NetworkWorker {
    cache: Cache,
    rpc: BitcoinRpcClient,
    owner_id: String,
}

impl NetworkWorker {
    pub fn new(cache: Cache, rpc: BitcoinRpcClient) -> Self {
        Self {
            cache,
            rpc,
            owner_id: Uuid::new_v4().to_string(),
        }
    }

    pub async fn run(&mut self) -> ! {
        let mut lease = Lease::new(
            self.cache.clone(),
            keys::NETWORK_LOCK_KEY,
            self.owner_id.clone(),
            Duration::from_secs(keys::BLOCKCHAIN_LOCK_TTL_SECONDS),
        );

        loop {
            let loop_start = Instant::now();
            let interval = Duration::from_secs(keys::NETWORK_DYNAMIC_UPDATE_INTERVAL_SECS);

            if !lease.is_held() {
                match lease.try_acquire().await {
                    Ok(true) => {}
                    Ok(false) => {
                        sleep_until_deadline(loop_start, interval).await;
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "network worker: cache unavailable acquiring lease");
                        sleep_until_deadline(loop_start, interval).await;
                        continue;
                    }
                }
            } else if !lease.renew().await.unwrap_or(false) {
                warn!("network worker: lost lease, aborting iteration");
                sleep_until_deadline(loop_start, interval).await;
                continue;
            }

            if let Err(e) = self.tick().await {
                warn!(error = %e, "network worker: tick failed");
            }

            sleep_until_deadline(loop_start, interval).await;
        }
    }

    async fn tick(&self) -> crate::error::FabricResult<()> {
        let tick_start = Instant::now();
        let info = self.rpc.get_network_info().await?;
        self.cache
            .set_json(keys::NETWORK_GETNETWORKINFO, &info, None)
            .await?;

        let connections = info.get("connections").and_then(|v| v.as_u64()).unwrap_or(0);
        let connections_in = info.get("connections_in").and_then(|v| v.as_u64()).unwrap_or(0);
        let connections_out = info.get("connections_out").and_then(|v| v.as_u64()).unwrap_or(0);
        let subversion = info
            .get("subversion")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let protocol_version = info.get("protocolversion").and_then(|v| v.as_u64()).unwrap_or(0);

        let view = NetworkDynamicView {
            connections,
            connections_in,
            connections_out,
            subversion,
            protocol_version,
            ingest_epoch_ms: now_ms(),
        };
        self.cache.set_json(keys::NETWORK_DYNAMIC_CACHE, &view, None).await?;

        publish_stats(&self.cache, keys::NETWORK_STATS_KEY, tick_start, None).await;
        Ok(())
    }
}
