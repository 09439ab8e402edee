//! Well-known cache key names and the constants attached to them.
//!
//! Carried over from the source system's `core/redis_keys.py`: one writer
//! per key, names and TTLs kept verbatim so the durable layout does not
//! silently drift from the system this crate replaces.

// ---- Blockchain (component C, input worker) ----
pub const BLOCKCHAIN_GETBLOCKCHAININFO_KEY: &str = "2_BLOCKCHAIN_GETBLOCKCHAININFO";
pub const BLOCKCHAIN_LATEST_BLOCK_KEY: &str = "2_BLOCKCHAIN_GETBLOCK_LATEST";
pub const BLOCKCHAIN_STATIC_KEY: &str = "2_BLOCKCHAIN_STATIC";
pub const BLOCKCHAIN_LOCK_KEY: &str = "2_BLOCKCHAIN_LOCK";
pub const BLOCKCHAIN_DYNAMIC_CACHE: &str = "2_BLOCKCHAIN_DYNAMIC_CACHE";
pub const BLOCKCHAIN_STATS_KEY: &str = "2_BLOCKCHAIN_INPUT_STATS";
pub const BLOCKCHAIN_DYNAMIC_BLOCKINFO_KEY: &str = "2_BLOCKCHAIN_DYNAMIC_BLOCKINFO";
pub const BLOCKCHAIN_DYNAMIC_HASHRATE_KEY: &str = "2_BLOCKCHAIN_DYNAMIC_HASHRATE";
pub const BLOCKCHAIN_DYNAMIC_HALVING_KEY: &str = "2_BLOCKCHAIN_DYNAMIC_HALVING";
pub const BLOCKCHAIN_DYNAMIC_WINNERHASH_KEY: &str = "2_BLOCKCHAIN_DYNAMIC_WINNERHASH";

pub const HALVING_INTERVAL: u64 = 210_000;
pub const LAST_HALVING_BLOCK: u64 = 840_000;
pub const BLOCK_TIME_SECONDS: u64 = 600;
pub const INITIAL_BLOCK_REWARD: u64 = 50;

pub const BLOCKCHAIN_LOCK_TTL_SECONDS: u64 = 10;
pub const BLOCKCHAIN_DYNAMIC_UPDATE_INTERVAL_SECS: u64 = 1;
pub const BLOCKCHAIN_STATIC_UPDATE_INTERVAL_SECS: u64 = 60 * 60 * 6;

// ---- Mempool ----
pub const MEMPOOL_GETMEMPOOLINFO: &str = "2_MEMPOOL_GETMEMPOOLINFO";
pub const MEMPOOL_STATIC_KEY: &str = "2_MEMPOOL_STATIC";
pub const MEMPOOL_LOCK_KEY: &str = "2_MEMPOOL_LOCK";
pub const MEMPOOL_DYNAMIC_CACHE: &str = "2_MEMPOOL_DYNAMIC_CACHE";
pub const MEMPOOL_STATS_KEY: &str = "2_MEMPOOL_INPUT_STATS";
pub const MEMPOOL_DYNAMIC_SIZEFEE_KEY: &str = "2_MEMPOOL_DYNAMIC_SIZEFEE";
pub const MEMPOOL_DYNAMIC_AVGTX_KEY: &str = "2_MEMPOOL_DYNAMIC_AVGTX";
pub const MEMPOOL_DYNAMIC_WAITTIME_KEY: &str = "2_MEMPOOL_DYNAMIC_WAITTIME";

pub const MEMPOOL_DYNAMIC_UPDATE_INTERVAL_SECS: u64 = 1;
pub const MEMPOOL_STATIC_UPDATE_INTERVAL_SECS: u64 = 60 * 60 * 24;
pub const MEMPOOL_WAIT_TIME_BUCKET_SIZE: u64 = 3000;
pub const MEMPOOL_WAIT_TIME_MINUTES_PER_BUCKET: u64 = 10;

// ---- Network ----
pub const NETWORK_GETNETWORKINFO: &str = "2_NETWORK_GETNETWORKINFO";
pub const NETWORK_STATIC_KEY: &str = "2_NETWORK_STATIC";
pub const NETWORK_LOCK_KEY: &str = "2_NETWORK_LOCK";
pub const NETWORK_DYNAMIC_CACHE: &str = "2_NETWORK_DYNAMIC_CACHE";
pub const NETWORK_STATS_KEY: &str = "2_NETWORK_INPUT_STATS";

pub const NETWORK_DYNAMIC_UPDATE_INTERVAL_SECS: u64 = 10;
pub const NETWORK_STATIC_UPDATE_INTERVAL_SECS: u64 = 60 * 60 * 6;

pub const NETWORK_NODES_CACHE_KEY: &str = "NETWORK_NODES_CACHE";
pub const NETWORK_NODES_LOCK_KEY: &str = "NETWORK_NODES_LOCK";
pub const NETWORK_MINER_CACHE_KEY: &str = "NETWORK_MINER_CACHE";
pub const NETWORK_MINER_LOCK_KEY: &str = "NETWORK_MINER_LOCK";

// ---- Top-N tracker (component E) ----
pub const BTC_TOP_PREFIX: &str = "3_BTC_TOP_";
pub const BTC_TOP_SEEN_KEY: &str = "3_BTC_TOP_SEEN";
pub const BTC_TOP_TXS_KEY: &str = "3_BTC_TOP_TXS";
pub const BTC_TOP_STATS_KEY: &str = "3_BTC_TOP_STATS";
pub const BTC_TOP_LOCK_KEY: &str = "3_BTC_TOP_LOCK";
pub const BTC_TOP_SEEN_VALUE_KEY: &str = "3_BTC_TOP_SEEN_VALUE";
pub const BTC_TOP_CURRENT_KEY: &str = "3_BTC_TOP_CURRENT";
pub const BTC_TOP_EVER_KEY: &str = "3_BTC_TOP_EVER";

pub const BTC_TOP_TOP_N: usize = 50;
pub const BTC_TOP_LOCK_TTL_SECONDS: u64 = 20;
pub const BTC_TOP_UPDATE_INTERVAL_MS: u64 = 2_500;

// ---- BTC volume (home aggregate) ----
pub const BTC_VOL_DYNAMIC_CACHE: &str = "HOME_BTC_VOL_DYNAMIC_CACHE";
pub const BTC_VOL_LOCK_KEY: &str = "HOME_BTC_VOL_LOCK";
pub const BTC_VOL_STATS_KEY: &str = "HOME_BTC_VOL_STATS";
pub const BTC_VOL_UPDATE_INTERVAL_MS: u64 = 2_500;
pub const BTC_VOL_LOCK_TTL_SECONDS: u64 = 10;

// ---- BTC price (coalesced, externally-sourced) ----
pub const HOME_BTC_PRICE_CACHE: &str = "HOME_BTC_PRICE_CACHE";
pub const HOME_PRICE_LOCK: &str = "HOME_PRICE_LOCK";
pub const HOME_BTC_PRICE_CACHE_TTL_SECONDS: u64 = 60;
pub const HOME_BTC_PRICE_LOCK_TTL_SECONDS: u64 = 50;
pub const HOME_BTC_PRICE_MAX_WAIT_MS: u64 = 5_000;
pub const HOME_BTC_PRICE_WAIT_STEP_MS: u64 = 250;

// ---- Metrics: difficulty / hashrate (input worker, node I) ----
pub const BTC_DIFFICULTY_PREFIX: &str = "METRICS_BTC_DIFFICULTY_";
pub const BTC_DIFFICULTY_1Y: &str = "METRICS_BTC_DIFFICULTY_1Y";
pub const BTC_DIFFICULTY_5Y: &str = "METRICS_BTC_DIFFICULTY_5Y";
pub const BTC_DIFFICULTY_10Y: &str = "METRICS_BTC_DIFFICULTY_10Y";
pub const BTC_DIFFICULTY_EVER: &str = "METRICS_BTC_DIFFICULTY_EVER";
pub const BTC_DIFFICULTY_OPEN_BUCKETS: &str = "METRICS_BTC_DIFFICULTY_OPEN_BUCKETS";
pub const BTC_DIFFICULTY_STATS: &str = "METRICS_BTC_DIFFICULTY_STATS";

pub const BTC_HASHRATE_PREFIX: &str = "METRICS_BTC_HASHRATE_";
pub const BTC_HASHRATE_1Y: &str = "METRICS_BTC_HASHRATE_1Y";
pub const BTC_HASHRATE_5Y: &str = "METRICS_BTC_HASHRATE_5Y";
pub const BTC_HASHRATE_10Y: &str = "METRICS_BTC_HASHRATE_10Y";
pub const BTC_HASHRATE_EVER: &str = "METRICS_BTC_HASHRATE_EVER";
pub const BTC_HASHRATE_OPEN_BUCKETS: &str = "METRICS_BTC_HASHRATE_OPEN_BUCKETS";
pub const BTC_HASHRATE_STATS: &str = "METRICS_BTC_HASHRATE_STATS";

pub const METRICS_UPDATE_INTERVAL_HOURS: u64 = 23;
pub const METRICS_RETRY_INTERVAL_SECONDS: u64 = 10;

// ---- Dashboard traffic (RAM only, bucket engine over pageview hits) ----
pub const DASHBOARD_REQUESTS_PREFIX: &str = "DASHBOARD_REQUESTS_";
pub const DASHBOARD_REQUESTS_EVER: &str = "DASHBOARD_REQUESTS_EVER";
pub const DASHBOARD_REQUESTS_OPEN_BUCKETS: &str = "DASHBOARD_REQUESTS_OPEN_BUCKETS";
pub const DASHBOARD_ALIVE_PREFIX: &str = "DASHBOARD_ALIVE_SESSION_";
pub const DASHBOARD_ALIVE_TTL_SECONDS: u64 = 10;

// ---- Metrics: tx volume / fees (RAM only, bucket engines) ----
pub const BTC_TX_VOLUME_PREFIX: &str = "METRICS_BTC_TX_VOLUME_";
pub const BTC_TX_VOLUME_STATS: &str = "METRICS_BTC_TX_VOLUME_STATS";
pub const BTC_TX_VOLUME_OPEN_BUCKETS: &str = "METRICS_BTC_TX_VOLUME_OPEN_BUCKETS";

pub const BTC_TX_FEES_PREFIX: &str = "METRICS_BTC_TX_FEES_";
pub const BTC_TX_FEES_STATS: &str = "METRICS_BTC_TX_FEES_STATS";
pub const BTC_TX_FEES_OPEN_BUCKETS: &str = "METRICS_BTC_TX_FEES_OPEN_BUCKETS";

pub const POLL_SECONDS: u64 = 10;

pub const BTC_TX_AMOUNT_HISTORY_KEY: &str = "METRICS_BTC_TX_AMOUNT_HISTORY";
pub const BTC_TX_AMOUNT_STATS_KEY: &str = "METRICS_BTC_TX_AMOUNT_STATS";
pub const BTC_TX_AMOUNT_TOP_NOW: usize = 50;
pub const BTC_TX_AMOUNT_TOP_OTHER: usize = 1000;

// ---- Explorer (address lookups) ----
pub const EXPLORER_ADDRESSES_MAX_ADDRESSES_DEFAULT: usize = 25;

/// Builds the publish key for a metric window, e.g. `METRICS_BTC_TX_VOLUME_1H`.
pub fn window_key(prefix: &str, window: &str) -> String {
    format!("{prefix}{}", window.to_uppercase())
}
