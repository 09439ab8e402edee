//! Top-N Tracker (component E), per spec.md §4.5: current top-K by value
//! over the live mempool, plus an ever-seen top-K persisted across restarts,
//! and a day-partitioned append-only log feeding downstream Bucket Engines.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::cache::Cache;
use crate::error::FabricResult;
use crate::keys;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValueEntry {
    pub id: String,
    pub btc_value: f64,
    pub observed_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopNSnapshot {
    pub updated_ms: i64,
    pub current: Vec<ValueEntry>,
    pub ever: Vec<ValueEntry>,
}

/// One append-only record, per spec.md §4.5 step 6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub btc_value: f64,
    pub observed_ms: i64,
}

pub struct TopNTracker {
    top_n: usize,
    dedup: HashSet<String>,
    values: HashMap<String, ValueEntry>,
    current: Vec<ValueEntry>,
    ever: Vec<ValueEntry>,
}

impl TopNTracker {
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n,
            dedup: HashSet::new(),
            values: HashMap::new(),
            current: Vec::new(),
            ever: Vec::new(),
        }
    }

    pub fn restore_ever(&mut self, ever: Vec<ValueEntry>) {
        for entry in &ever {
            self.dedup.insert(entry.id.clone());
            self.values.insert(entry.id.clone(), entry.clone());
        }
        self.ever = ever;
        self.resort_ever();
    }

    /// One tick: reconcile against the upstream id set, fetch+insert newly
    /// observed ids via `fetch_value`, publish, and return freshly logged
    /// records for the caller to append to the day-partitioned log.
    pub async fn tick<F, Fut>(
        &mut self,
        upstream_ids: Vec<String>,
        now_ms: i64,
        fetch_value: F,
    ) -> FabricResult<Vec<LogRecord>>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = FabricResult<f64>>,
    {
        let upstream: HashSet<String> = upstream_ids.iter().cloned().collect();

        // Step 2: drop ids no longer present upstream from dedup/values.
        let stale: Vec<String> = self
            .dedup
            .iter()
            .filter(|id| !upstream.contains(*id))
            .cloned()
            .collect();
        for id in &stale {
            self.dedup.remove(id);
            self.values.remove(id);
        }

        // Step 3: fetch and insert ids not yet seen.
        let mut new_records = Vec::new();
        for id in upstream_ids {
            if self.dedup.contains(&id) {
                continue;
            }
            let btc_value = fetch_value(id.clone()).await?;
            let entry = ValueEntry {
                id: id.clone(),
                btc_value,
                observed_ms: now_ms,
            };
            self.dedup.insert(id.clone());
            self.values.insert(id.clone(), entry.clone());
            self.consider_ever(entry);
            new_records.push(LogRecord {
                id,
                btc_value,
                observed_ms: now_ms,
            });
        }

        // Step 4: current is always rebuilt from the full live-values set, so
        // an entry truncated out on a prior tick can resurface once the
        // entry that displaced it leaves upstream (spec.md §8 scenario 4).
        self.current = self
            .values
            .values()
            .filter(|e| upstream.contains(&e.id))
            .cloned()
            .collect();
        self.resort_current();
        Ok(new_records)
    }

    fn consider_ever(&mut self, entry: ValueEntry) {
        if self.ever.len() < self.top_n {
            self.ever.push(entry);
            self.resort_ever();
            return;
        }
        let kth = self.ever.last().map(|e| e.btc_value).unwrap_or(0.0);
        if entry.btc_value > kth {
            self.ever.push(entry);
            self.resort_ever();
            self.ever.truncate(self.top_n);
        }
    }

    fn resort_current(&mut self) {
        self.current
            .sort_by(|a, b| b.btc_value.partial_cmp(&a.btc_value).unwrap_or(std::cmp::Ordering::Equal));
        self.current.truncate(self.top_n);
    }

    fn resort_ever(&mut self) {
        self.ever
            .sort_by(|a, b| b.btc_value.partial_cmp(&a.btc_value).unwrap_or(std::cmp::Ordering::Equal));
    }

    pub fn ever(&self) -> &[ValueEntry] {
        &self.ever
    }

    pub fn current(&self) -> &[ValueEntry] {
        &self.current
    }

    /// Publishes both lists plus the update timestamp atomically (one cache
    /// write, one document), per spec.md §4.5 step 5.
    pub async fn publish(&self, cache: &Cache, now_ms: i64) -> FabricResult<()> {
        let snapshot = TopNSnapshot {
            updated_ms: now_ms,
            current: self.current.clone(),
            ever: self.ever.clone(),
        };
        cache.set_json(keys::BTC_TOP_CURRENT_KEY, &snapshot.current, None).await?;
        cache.set_json(keys::BTC_TOP_EVER_KEY, &snapshot.ever, None).await?;
        cache.set_json(keys::BTC_TOP_SEEN_VALUE_KEY, &self.values, None).await?;
        cache.set_json(keys::BTC_TOP_TXS_KEY, &snapshot, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn value(n: f64) -> FabricResult<f64> {
        Ok(n)
    }

    #[tokio::test]
    async fn seen_value_is_never_refetched() {
        let mut tracker = TopNTracker::new(2);
        tracker
            .tick(vec!["a".into()], 1_000, |_| async { value(1.0).await })
            .await
            .unwrap();
        // second tick, same id still upstream: a refetch would return 99.0,
        // but the dedup set must short-circuit before fetch_value runs.
        let records = tracker
            .tick(vec!["a".into()], 2_000, |_| async { value(99.0).await })
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(tracker.values.get("a").unwrap().btc_value, 1.0);
    }

    #[tokio::test]
    async fn current_list_drops_ids_no_longer_upstream() {
        let mut tracker = TopNTracker::new(2);
        tracker
            .tick(vec!["a".into(), "b".into()], 1_000, |id| async move {
                if id == "a" { value(5.0).await } else { value(3.0).await }
            })
            .await
            .unwrap();
        assert_eq!(tracker.current().len(), 2);

        tracker
            .tick(vec!["a".into()], 2_000, |_| async { value(1.0).await })
            .await
            .unwrap();
        assert_eq!(tracker.current().len(), 1);
        assert_eq!(tracker.current()[0].id, "a");
    }

    #[tokio::test]
    async fn ever_list_is_monotonic_at_capacity() {
        let mut tracker = TopNTracker::new(1);
        tracker
            .tick(vec!["a".into()], 1_000, |_| async { value(10.0).await })
            .await
            .unwrap();
        tracker
            .tick(vec!["b".into()], 2_000, |_| async { value(1.0).await })
            .await
            .unwrap();
        assert_eq!(tracker.ever().len(), 1);
        assert_eq!(tracker.ever()[0].id, "a");
    }
}
