//! Shared state threaded through every API handler: the cache, the
//! coalescers for the handful of endpoints permitted to wait on upstream
//! (address / transaction / wallet), and the request-count Bucket Engine fed
//! directly by the pageview handler, per spec.md §4.7.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bucket::{BucketEngine, Derivation, WindowSpec};
use crate::cache::Cache;
use crate::config::AppConfig;
use crate::coordination::Coalescer;
use crate::ingest::{BitcoinRpcClient, ElectrumClient};
use crate::keys;

#[derive(Clone)]
pub struct ApiState {
    pub cache: Cache,
    pub electrum: ElectrumClient,
    pub rpc: BitcoinRpcClient,
    pub lookup_coalescer: Arc<Coalescer>,
    pub traffic_engine: Arc<Mutex<BucketEngine>>,
    pub max_wallet_addresses: usize,
}

/// Bucket widths per spec.md §3's table: 1h->10s, 24h->1min, 1w/1m->1h,
/// 1y->1d, plus an unbounded "ever" tier for `/api/home_traffic`.
fn request_count_windows() -> Vec<WindowSpec> {
    vec![
        WindowSpec { name: "1h".into(), bucket_ms: 10_000, window_ms: 3_600_000, publish_key: keys::window_key(keys::DASHBOARD_REQUESTS_PREFIX, "1h") },
        WindowSpec { name: "24h".into(), bucket_ms: 60_000, window_ms: 86_400_000, publish_key: keys::window_key(keys::DASHBOARD_REQUESTS_PREFIX, "24h") },
        WindowSpec { name: "1w".into(), bucket_ms: 3_600_000, window_ms: 604_800_000, publish_key: keys::window_key(keys::DASHBOARD_REQUESTS_PREFIX, "1w") },
        WindowSpec { name: "1m".into(), bucket_ms: 3_600_000, window_ms: 2_592_000_000, publish_key: keys::window_key(keys::DASHBOARD_REQUESTS_PREFIX, "1m") },
        WindowSpec { name: "1y".into(), bucket_ms: 86_400_000, window_ms: 31_536_000_000, publish_key: keys::window_key(keys::DASHBOARD_REQUESTS_PREFIX, "1y") },
        WindowSpec { name: "ever".into(), bucket_ms: 86_400_000, window_ms: 100 * 31_536_000_000, publish_key: keys::DASHBOARD_REQUESTS_EVER.to_string() },
    ]
}

impl ApiState {
    pub fn new(cache: Cache, electrum: ElectrumClient, rpc: BitcoinRpcClient, config: &AppConfig) -> Self {
        let _ = config;
        let traffic_engine = BucketEngine::new(
            cache.clone(),
            Derivation::Sum,
            request_count_windows(),
            keys::DASHBOARD_REQUESTS_OPEN_BUCKETS,
        );
        Self {
            lookup_coalescer: Arc::new(Coalescer::new(cache.clone())),
            traffic_engine: Arc::new(Mutex::new(traffic_engine)),
            max_wallet_addresses: keys::EXPLORER_ADDRESSES_MAX_ADDRESSES_DEFAULT,
            cache,
            electrum,
            rpc,
        }
    }
}
