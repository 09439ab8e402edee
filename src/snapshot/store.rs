//! Snapshot Store (component F), per spec.md §4.6: durable recovery state
//! for stateful components, written via write-temp-then-rename, daily
//! rotated by the UTC day of the data's most-recent timestamp (not wall
//! clock), with degraded-day segment handling for RAM-wipe protection.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::bucket::Point;
use crate::error::{FabricError, FabricResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BucketHistory {
    pub history: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenBucketSnap {
    pub cur_bucket_start: i64,
    pub sum: i64,
    pub weight: i64,
    pub count: u64,
}

/// Recovery shape for one Bucket Engine, per spec.md §4.6 "Contents per
/// component type".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSnapshot {
    pub generated_utc: String,
    pub last_ts_ms: i64,
    pub buckets: HashMap<String, BucketHistory>,
    pub open_buckets: HashMap<String, OpenBucketSnap>,
}

/// One snapshot directory per component kind (e.g. `tx_volume`, `topn_ever`).
/// Filenames are `<kind>_YYYY-MM-DD.json`.
pub struct SnapshotStore {
    dir: PathBuf,
    kind: String,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, kind: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            kind: kind.into(),
        }
    }

    fn path_for_day(&self, utc_day: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.json", self.kind, utc_day))
    }

    /// Writes `value` as the snapshot for the UTC day of `last_ts_ms`
    /// (spec.md §4.6: "writers select the snapshot filename by the UTC day
    /// of the data's most-recent timestamp, not wall clock"), atomically via
    /// write-to-temp + rename.
    pub async fn write<T: Serialize + ?Sized>(&self, utc_day: &str, value: &T) -> FabricResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| FabricError::Internal(e.to_string()))?;

        let final_path = self.path_for_day(utc_day);
        let tmp_path = self.dir.join(format!("{}_{}.json.tmp", self.kind, utc_day));

        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| FabricError::Internal(e.to_string()))?;
        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| FabricError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Loads the most recently-dated snapshot file for this kind, per
    /// spec.md §4.6 "Read semantics (warm-start)". Returns `None` if no
    /// snapshot exists yet (first run).
    pub fn load_latest<T: DeserializeOwned>(&self) -> FabricResult<Option<T>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(None),
        };

        let prefix = format!("{}_", self.kind);
        let mut candidates: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(&prefix) && n.ends_with(".json"))
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort();

        match candidates.pop() {
            Some(path) => {
                let bytes = std::fs::read(&path).map_err(|e| FabricError::Internal(e.to_string()))?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            None => Ok(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Decides whether today's RAM-resident append log has been wiped relative
/// to its own durable record, per spec.md §4.6 "Degraded mode": a same-day
/// log that shrank below its last known size, while the durable copy is
/// still larger, must not be overwritten.
pub fn is_degraded_day(ram_size_bytes: u64, durable_size_bytes: u64, min_size_bytes: u64) -> bool {
    ram_size_bytes < min_size_bytes && durable_size_bytes > ram_size_bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_load_latest_roundtrips() {
        let dir = tempdir::TempDir::new("snapshot").unwrap();
        let store = SnapshotStore::new(dir.path(), "tx_volume");

        let snap = BucketSnapshot {
            generated_utc: "2026-01-01T00:00:00Z".to_string(),
            last_ts_ms: 1_000,
            buckets: HashMap::new(),
            open_buckets: HashMap::new(),
        };
        store.write("2026-01-01", &snap).await.unwrap();

        let loaded: Option<BucketSnapshot> = store.load_latest().unwrap();
        assert_eq!(loaded.unwrap().last_ts_ms, 1_000);
    }

    #[tokio::test]
    async fn load_latest_picks_newest_day_by_filename() {
        let dir = tempdir::TempDir::new("snapshot").unwrap();
        let store = SnapshotStore::new(dir.path(), "tx_volume");

        let mut snap = BucketSnapshot {
            generated_utc: "x".to_string(),
            last_ts_ms: 1,
            buckets: HashMap::new(),
            open_buckets: HashMap::new(),
        };
        store.write("2026-01-01", &snap).await.unwrap();
        snap.last_ts_ms = 2;
        store.write("2026-01-02", &snap).await.unwrap();

        let loaded: BucketSnapshot = store.load_latest().unwrap().unwrap();
        assert_eq!(loaded.last_ts_ms, 2);
    }

    #[tokio::test]
    async fn no_snapshot_yet_returns_none() {
        let dir = tempdir::TempDir::new("snapshot").unwrap();
        let store = SnapshotStore::new(dir.path(), "tx_volume");
        let loaded: Option<BucketSnapshot> = store.load_latest().unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn degraded_day_detection() {
        assert!(is_degraded_day(100, 50_000, 1_000));
        assert!(!is_degraded_day(50_000, 100, 1_000));
        assert!(!is_degraded_day(2_000, 50_000, 1_000));
    }
}
