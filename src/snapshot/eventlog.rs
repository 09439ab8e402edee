//! Day-partitioned append-only event log on a RAM-backed path, per spec.md
//! §4.5 step 6 and §4.6: `all_events_YYYYMMDD.jsonl`, one line-delimited JSON
//! record per line. Retention is age-based and independent of the durable
//! snapshot copy.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{FabricError, FabricResult};

pub struct EventLog {
    dir: PathBuf,
    prefix: String,
}

impl EventLog {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    fn path_for_day(&self, utc_day: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.jsonl", self.prefix, utc_day))
    }

    /// Appends one record as a JSON line to the log for `utc_day` (the day
    /// of the record's own timestamp, not wall clock).
    pub async fn append<T: Serialize>(&self, utc_day: &str, record: &T) -> FabricResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| FabricError::Internal(e.to_string()))?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let path = self.path_for_day(utc_day);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| FabricError::Internal(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| FabricError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Counts bytes currently in the log for `utc_day`; used to detect a
    /// degraded (RAM-wiped) day before deciding whether to segment.
    pub fn size_bytes(&self, utc_day: &str) -> u64 {
        std::fs::metadata(self.path_for_day(utc_day))
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Writes a segment file distinct from the primary day file, used once a
    /// day has been marked degraded so further writes don't collide with the
    /// (smaller) RAM-resident file.
    pub fn segment_path(&self, utc_day: &str, segment_seq: u64) -> PathBuf {
        self.dir.join(format!("{}_{}.segment-{}.jsonl", self.prefix, utc_day, segment_seq))
    }

    /// Deletes log files older than `max_age_days`, independent of the
    /// durable snapshot copy, per spec.md §4.6 Retention.
    pub fn prune_older_than(&self, max_age_days: u64) -> FabricResult<()> {
        let cutoff = std::time::SystemTime::now()
            .checked_sub(std::time::Duration::from_secs(max_age_days * 86_400))
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(()),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                if let Ok(modified) = meta.modified() {
                    if modified < cutoff {
                        let _ = std::fs::remove_file(&path);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Synchronous append used in tests where a Tokio runtime isn't already
/// driving the call site.
#[cfg(test)]
fn append_sync(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn append_creates_one_file_per_day() {
        let dir = tempdir::TempDir::new("eventlog").unwrap();
        let log = EventLog::new(dir.path(), "all_events");
        log.append("20260101", &json!({"id": "a"})).await.unwrap();
        log.append("20260101", &json!({"id": "b"})).await.unwrap();
        log.append("20260102", &json!({"id": "c"})).await.unwrap();

        let day1 = std::fs::read_to_string(dir.path().join("all_events_20260101.jsonl")).unwrap();
        assert_eq!(day1.lines().count(), 2);
        assert!(dir.path().join("all_events_20260102.jsonl").exists());
    }

    #[test]
    fn size_bytes_reflects_degraded_day_detection() {
        let dir = tempdir::TempDir::new("eventlog").unwrap();
        let log = EventLog::new(dir.path(), "all_events");
        assert_eq!(log.size_bytes("20260101"), 0);
        append_sync(&log.path_for_day("20260101"), "{}\n").unwrap();
        assert!(log.size_bytes("20260101") > 0);
    }
}
