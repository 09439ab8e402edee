//! Blockchain ingest worker, per spec.md §4.3: every second, pulls
//! `getblockchaininfo` + the best block, derives five sub-views, and
//! publishes worker health. Static view (network-wide facts that rarely
//! change) refreshes every 6h. Block-age is a process-local timer reset on
//! best-block-hash change.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::bucket::{BucketEngine, Derivation, WindowSpec};
use crate::cache::Cache;
use crate::coordination::Lease;
use crate::ingest::rpc_client::BitcoinRpcClient;
use crate::keys;

const DAY_MS: i64 = 86_400_000;
const YEAR_MS: i64 = 365 * DAY_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Long-horizon point-in-time series (difficulty, hashrate) sampled on the
/// same cadence as the static refresh, per spec.md §3's bucket-width table
/// generalized to multi-year windows: daily buckets out to a year, weekly
/// buckets out to a decade, monthly buckets for the unbounded "ever" series.
fn long_horizon_windows(prefix: &str) -> Vec<WindowSpec> {
    vec![
        WindowSpec { name: "1y".into(), bucket_ms: DAY_MS, window_ms: YEAR_MS, publish_key: keys::window_key(prefix, "1y") },
        WindowSpec { name: "5y".into(), bucket_ms: WEEK_MS, window_ms: 5 * YEAR_MS, publish_key: keys::window_key(prefix, "5y") },
        WindowSpec { name: "10y".into(), bucket_ms: WEEK_MS, window_ms: 10 * YEAR_MS, publish_key: keys::window_key(prefix, "10y") },
        WindowSpec { name: "ever".into(), bucket_ms: 30 * DAY_MS, window_ms: 100 * YEAR_MS, publish_key: keys::window_key(prefix, "ever") },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: String,
    pub tx_count: u64,
    pub ingest_epoch_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashrateView {
    pub difficulty: f64,
    pub hashrate_eh_s: f64,
    pub ingest_epoch_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HalvingView {
    pub blocks_remaining: u64,
    pub seconds_remaining: u64,
    pub ingest_epoch_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerHashView {
    pub hash: String,
    pub ingest_epoch_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainDynamicView {
    pub height: u64,
    pub tx_count: u64,
    pub block_age_secs: u64,
    pub hashrate_eh_s: f64,
    pub halving_blocks_remaining: u64,
    pub halving_seconds_remaining: u64,
    pub winner_hash: String,
    pub ingest_epoch_ms: u64,
}

/// `hashrate (H/s) = difficulty * 2^32 / block_time_seconds`, per spec.md §4.3.
pub fn hashrate_eh_s(difficulty: f64) -> f64 {
    let hashes_per_sec = difficulty * 2f64.powi(32) / keys::BLOCK_TIME_SECONDS as f64;
    hashes_per_sec / 1e18
}

/// Countdown to the next halving given the current height, per spec.md §8
/// scenario 6 (`210000 - 17500 = 192500` at height 857500).
pub fn halving_countdown(height: u64) -> (u64, u64) {
    let since_last = height.saturating_sub(keys::LAST_HALVING_BLOCK);
    let into_interval = since_last % keys::HALVING_INTERVAL;
    let blocks_remaining = keys::HALVING_INTERVAL - into_interval;
    (blocks_remaining, blocks_remaining * keys::BLOCK_TIME_SECONDS)
}

pub struct BlockchainWorker {
    cache: Cache,
    rpc: BitcoinRpcClient,
    owner_id: String,
    last_block_hash: Option<String>,
    last_hash_seen_at: Instant,
    last_static_refresh: Option<Instant>,
    last_long_horizon_sample: Option<Instant>,
    difficulty_engine: BucketEngine,
    hashrate_engine: BucketEngine,
}

impl BlockchainWorker {
    pub fn new(cache: Cache, rpc: BitcoinRpcClient) -> Self {
        let difficulty_engine = BucketEngine::new(
            cache.clone(),
            Derivation::Average,
            long_horizon_windows(keys::BTC_DIFFICULTY_PREFIX),
            keys::BTC_DIFFICULTY_OPEN_BUCKETS,
        );
        let hashrate_engine = BucketEngine::new(
            cache.clone(),
            Derivation::Average,
            long_horizon_windows(keys::BTC_HASHRATE_PREFIX),
            keys::BTC_HASHRATE_OPEN_BUCKETS,
        );
        Self {
            cache,
            rpc,
            owner_id: Uuid::new_v4().to_string(),
            last_block_hash: None,
            last_hash_seen_at: Instant::now(),
            last_static_refresh: None,
            last_long_horizon_sample: None,
            difficulty_engine,
            hashrate_engine,
        }
    }

    pub async fn run(&mut self) -> ! {
        let mut lease = Lease::new(
            self.cache.clone(),
            keys::BLOCKCHAIN_LOCK_KEY,
            self.owner_id.clone(),
            Duration::from_secs(keys::BLOCKCHAIN_LOCK_TTL_SECONDS),
        );

        loop {
            let loop_start = Instant::now();
            let interval = Duration::from_secs(keys::BLOCKCHAIN_DYNAMIC_UPDATE_INTERVAL_SECS);

            if !lease.is_held() {
                match lease.try_acquire().await {
                    Ok(true) => {}
                    Ok(false) => {
                        sleep_until_deadline(loop_start, interval).await;
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "blockchain worker: cache unavailable acquiring lease");
                        sleep_until_deadline(loop_start, interval).await;
                        continue;
                    }
                }
            } else if !lease.renew().await.unwrap_or(false) {
                warn!("blockchain worker: lost lease, aborting iteration");
                sleep_until_deadline(loop_start, interval).await;
                continue;
            }

            if let Err(e) = self.tick().await {
                warn!(error = %e, "blockchain worker: tick failed");
            }

            if self
                .last_static_refresh
                .map(|t| t.elapsed() >= Duration::from_secs(keys::BLOCKCHAIN_STATIC_UPDATE_INTERVAL_SECS))
                .unwrap_or(true)
            {
                if let Err(e) = self.refresh_static().await {
                    warn!(error = %e, "blockchain worker: static refresh failed");
                } else {
                    self.last_static_refresh = Some(Instant::now());
                }
            }

            if self
                .last_long_horizon_sample
                .map(|t| t.elapsed() >= Duration::from_secs(keys::METRICS_UPDATE_INTERVAL_HOURS * 3600))
                .unwrap_or(true)
            {
                if let Err(e) = self.sample_long_horizon().await {
                    warn!(error = %e, "blockchain worker: difficulty/hashrate sample failed");
                } else {
                    self.last_long_horizon_sample = Some(Instant::now());
                }
            }

            sleep_until_deadline(loop_start, interval).await;
        }
    }

    async fn tick(&mut self) -> crate::error::FabricResult<()> {
        let tick_start = Instant::now();
        let info = self.rpc.get_blockchain_info().await?;
        self.cache
            .set_json(keys::BLOCKCHAIN_GETBLOCKCHAININFO_KEY, &info, None)
            .await?;

        let height = info.get("blocks").and_then(|v| v.as_u64()).unwrap_or(0);
        let hash = info
            .get("bestblockhash")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let difficulty = info.get("difficulty").and_then(|v| v.as_f64()).unwrap_or(0.0);

        let block = self.rpc.get_block(&hash).await?;
        let tx_count = block
            .get("tx")
            .and_then(|v| v.as_array())
            .map(|a| a.len() as u64)
            .unwrap_or(0);

        if self.last_block_hash.as_deref() != Some(hash.as_str()) {
            self.last_block_hash = Some(hash.clone());
            self.last_hash_seen_at = Instant::now();
        }

        let epoch_ms = now_ms();
        let block_info = BlockInfo {
            height,
            hash: hash.clone(),
            tx_count,
            ingest_epoch_ms: epoch_ms,
        };
        let hashrate = HashrateView {
            difficulty,
            hashrate_eh_s: hashrate_eh_s(difficulty),
            ingest_epoch_ms: epoch_ms,
        };
        let (blocks_remaining, seconds_remaining) = halving_countdown(height);
        let halving = HalvingView {
            blocks_remaining,
            seconds_remaining,
            ingest_epoch_ms: epoch_ms,
        };
        let winner = WinnerHashView {
            hash: hash.clone(),
            ingest_epoch_ms: epoch_ms,
        };

        self.cache
            .set_json(keys::BLOCKCHAIN_DYNAMIC_BLOCKINFO_KEY, &block_info, None)
            .await?;
        self.cache
            .set_json(keys::BLOCKCHAIN_DYNAMIC_HASHRATE_KEY, &hashrate, None)
            .await?;
        self.cache
            .set_json(keys::BLOCKCHAIN_DYNAMIC_HALVING_KEY, &halving, None)
            .await?;
        self.cache
            .set_json(keys::BLOCKCHAIN_DYNAMIC_WINNERHASH_KEY, &winner, None)
            .await?;

        let aggregate = BlockchainDynamicView {
            height,
            tx_count,
            block_age_secs: self.last_hash_seen_at.elapsed().as_secs(),
            hashrate_eh_s: hashrate.hashrate_eh_s,
            halving_blocks_remaining: blocks_remaining,
            halving_seconds_remaining: seconds_remaining,
            winner_hash: hash,
            ingest_epoch_ms: epoch_ms,
        };
        self.cache
            .set_json(keys::BLOCKCHAIN_DYNAMIC_CACHE, &aggregate, None)
            .await?;

        publish_stats(&self.cache, keys::BLOCKCHAIN_STATS_KEY, tick_start, None).await;
        Ok(())
    }

    async fn refresh_static(&self) -> crate::error::FabricResult<()> {
        let info = self.rpc.get_network_info().await?;
        self.cache
            .set_json(keys::BLOCKCHAIN_STATIC_KEY, &info, None)
            .await?;
        info!("blockchain worker: static view refreshed");
        Ok(())
    }

    /// Feeds one sample into the difficulty/hashrate long-horizon bucket
    /// engines, at the `METRICS_UPDATE_INTERVAL_HOURS` cadence rather than
    /// every tick, since these windows resolve no finer than a day.
    async fn sample_long_horizon(&mut self) -> crate::error::FabricResult<()> {
        let tick_start = Instant::now();
        let Some(hashrate): Option<HashrateView> =
            self.cache.get_json(keys::BLOCKCHAIN_DYNAMIC_HASHRATE_KEY).await?
        else {
            return Ok(());
        };
        let now = now_ms() as i64;
        self.difficulty_engine.ingest(now, hashrate.difficulty.round() as i64, 0);
        self.hashrate_engine.ingest(now, hashrate.hashrate_eh_s.round() as i64, 0);
        self.difficulty_engine.tick(now).await?;
        self.hashrate_engine.tick(now).await?;
        publish_stats(&self.cache, keys::BTC_DIFFICULTY_STATS, tick_start, None).await;
        publish_stats(&self.cache, keys::BTC_HASHRATE_STATS, tick_start, None).await;
        Ok(())
    }
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub(crate) async fn sleep_until_deadline(loop_start: Instant, interval: Duration) {
    let deadline = loop_start + interval;
    let now = Instant::now();
    if deadline > now {
        tokio::time::sleep(deadline - now).await;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    pub last_run_ts_ms: u64,
    pub scan_time_ms: u64,
    pub last_error: Option<String>,
}

pub(crate) async fn publish_stats(cache: &Cache, key: &str, tick_start: Instant, error: Option<String>) {
    let stats = WorkerStats {
        last_run_ts_ms: now_ms(),
        scan_time_ms: tick_start.elapsed().as_millis() as u64,
        last_error: error,
    };
    if let Err(e) = cache.set_json(key, &stats, None).await {
        warn!(error = %e, "failed to publish worker stats");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halving_countdown_matches_spec_scenario() {
        let (blocks, seconds) = halving_countdown(857_500);
        assert_eq!(blocks, 192_500);
        assert_eq!(seconds, 192_500 * 600);
    }

    #[test]
    fn halving_countdown_at_exact_halving_block() {
        let (blocks, _) = halving_countdown(840_000);
        assert_eq!(blocks, 210_000);
    }

    #[test]
    fn hashrate_formula_is_difficulty_times_2_32_over_600() {
        let hr = hashrate_eh_s(1.0);
        let expected = 2f64.powi(32) / 600.0 / 1e18;
        assert!((hr - expected).abs() < 1e-12);
    }
}
