//! Bucket Engine (component D): a named metric (tx volume, tx fees, request
//! counts, …) maintained as several parallel tumbling-window series, each
//! published to its own cache key, per spec.md §4.4.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::bucket::window::{Accumulator, BucketWindow, Derivation, Point};
use crate::cache::Cache;
use crate::error::FabricResult;

#[derive(Debug, Clone)]
pub struct WindowSpec {
    pub name: String,
    pub bucket_ms: i64,
    pub window_ms: i64,
    pub publish_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PublishedOpenBucket {
    cur_bucket_start: i64,
    accumulator: Accumulator,
}

pub struct BucketEngine {
    cache: Cache,
    derivation: Derivation,
    windows: HashMap<String, BucketWindow>,
    specs: Vec<WindowSpec>,
    open_buckets_key: String,
}

impl BucketEngine {
    pub fn new(cache: Cache, derivation: Derivation, specs: Vec<WindowSpec>, open_buckets_key: impl Into<String>) -> Self {
        let windows = specs
            .iter()
            .map(|s| (s.name.clone(), BucketWindow::new(s.bucket_ms, s.window_ms, derivation)))
            .collect();
        Self {
            cache,
            derivation,
            windows,
            specs,
            open_buckets_key: open_buckets_key.into(),
        }
    }

    /// Feed one observation into every configured window. `weight` is vbytes
    /// for fee-rate engines; pass `0` for plain-sum engines.
    pub fn ingest(&mut self, timestamp_ms: i64, observation: i64, weight: i64) {
        for window in self.windows.values_mut() {
            window.ingest(timestamp_ms, observation, weight);
        }
    }

    /// Called on every worker tick; finalizes any window whose bucket has
    /// aged out even without new events, then republishes all windows.
    pub async fn tick(&mut self, now_ms: i64) -> FabricResult<()> {
        for window in self.windows.values_mut() {
            window.idle_flush(now_ms);
        }
        self.publish(now_ms).await
    }

    pub async fn publish(&mut self, latest_ms: i64) -> FabricResult<()> {
        let mut open_buckets = HashMap::new();
        for spec in &self.specs {
            let window = self.windows.get_mut(&spec.name).expect("window configured in specs");
            let series: Vec<Point> = window.published_series(latest_ms);
            self.cache.set_json(&spec.publish_key, &series, None).await?;

            if let Some((cur_bucket_start, accumulator)) = window.open_bucket() {
                open_buckets.insert(
                    spec.name.clone(),
                    PublishedOpenBucket {
                        cur_bucket_start,
                        accumulator,
                    },
                );
            }
        }
        self.cache.set_json(&self.open_buckets_key, &open_buckets, None).await?;
        Ok(())
    }

    /// Restores windows from a loaded snapshot (component F warm start).
    pub fn restore(&mut self, snapshot: &crate::snapshot::store::BucketSnapshot) {
        for spec in &self.specs {
            if let Some(window) = self.windows.get_mut(&spec.name) {
                let history = snapshot
                    .buckets
                    .get(&spec.name)
                    .map(|h| h.history.clone())
                    .unwrap_or_default();
                let open = snapshot.open_buckets.get(&spec.name).map(|o| {
                    (
                        o.cur_bucket_start,
                        Accumulator {
                            sum: o.sum,
                            weight: o.weight,
                            count: o.count,
                        },
                    )
                });
                window.restore(snapshot.last_ts_ms, history, open);
            }
        }
    }

    /// Full recovery snapshot of every window, for the Snapshot Store.
    pub fn to_snapshot(&self, generated_utc: String) -> crate::snapshot::store::BucketSnapshot {
        let mut buckets = HashMap::new();
        let mut open_buckets = HashMap::new();
        for spec in &self.specs {
            let window = self.windows.get(&spec.name).expect("window configured in specs");
            buckets.insert(
                spec.name.clone(),
                crate::snapshot::store::BucketHistory {
                    history: window.history_snapshot(),
                },
            );
            if let Some((cur_bucket_start, acc)) = window.open_bucket() {
                open_buckets.insert(
                    spec.name.clone(),
                    crate::snapshot::store::OpenBucketSnap {
                        cur_bucket_start,
                        sum: acc.sum,
                        weight: acc.weight,
                        count: acc.count,
                    },
                );
            }
        }
        crate::snapshot::store::BucketSnapshot {
            generated_utc,
            last_ts_ms: self.last_ts_ms(),
            buckets,
            open_buckets,
        }
    }

    pub fn last_ts_ms(&self) -> i64 {
        self.windows
            .values()
            .map(|w| w.last_processed_ms())
            .max()
            .unwrap_or(i64::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    #[tokio::test]
    async fn publishes_one_key_per_window() {
        let cache = Cache::new(MemoryCache::new());
        let specs = vec![
            WindowSpec {
                name: "1h".into(),
                bucket_ms: 60_000,
                window_ms: 3_600_000,
                publish_key: "vol_1h".into(),
            },
            WindowSpec {
                name: "24h".into(),
                bucket_ms: 3_600_000,
                window_ms: 86_400_000,
                publish_key: "vol_24h".into(),
            },
        ];
        let mut engine = BucketEngine::new(cache.clone(), Derivation::Sum, specs, "vol_open");
        engine.ingest(1_000, 5, 0);
        engine.tick(70_000).await.unwrap();

        let series: Vec<Point> = cache.get_json("vol_1h").await.unwrap().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].y, 5.0);

        let series24: Vec<Point> = cache.get_json("vol_24h").await.unwrap().unwrap();
        assert!(series24.is_empty() || series24[0].y == 0.0 || series24.len() <= 1);
    }
}
