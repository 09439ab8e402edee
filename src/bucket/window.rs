//! A single tumbling-bucket series for one (engine, window) pair, per
//! spec.md §4.4.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How a folded accumulator becomes a published value. Fee-rate windows
/// divide weighted sums; volume/request-count windows are raw sums; slowly
/// varying point-in-time metrics (difficulty, hashrate) average the samples
/// folded into a bucket instead of summing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    Sum,
    FeeRate,
    Average,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Accumulator {
    pub sum: i64,
    pub weight: i64,
    pub count: u64,
}

impl Accumulator {
    fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn fold(&mut self, observation: i64, weight: i64) {
        self.sum += observation;
        self.weight += weight;
        self.count += 1;
    }

    fn derive(&self, how: Derivation) -> f64 {
        match how {
            Derivation::Sum => self.sum as f64,
            Derivation::FeeRate => {
                if self.weight > 0 {
                    self.sum as f64 / self.weight as f64
                } else {
                    0.0
                }
            }
            Derivation::Average => {
                if self.count > 0 {
                    self.sum as f64 / self.count as f64
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: f64,
}

/// State and retention for one window of one Bucket Engine.
pub struct BucketWindow {
    pub bucket_ms: i64,
    pub window_ms: i64,
    pub derivation: Derivation,
    cur_bucket_start: Option<i64>,
    cur_accumulator: Accumulator,
    history: VecDeque<Point>,
    last_processed_ms: i64,
}

impl BucketWindow {
    pub fn new(bucket_ms: i64, window_ms: i64, derivation: Derivation) -> Self {
        Self {
            bucket_ms,
            window_ms,
            derivation,
            cur_bucket_start: None,
            cur_accumulator: Accumulator::default(),
            history: VecDeque::new(),
            last_processed_ms: i64::MIN,
        }
    }

    pub fn last_processed_ms(&self) -> i64 {
        self.last_processed_ms
    }

    pub fn open_bucket(&self) -> Option<(i64, Accumulator)> {
        self.cur_bucket_start.map(|start| (start, self.cur_accumulator))
    }

    /// The finalized history as-is, without trimming to a publish window —
    /// used when serializing a full recovery snapshot.
    pub fn history_snapshot(&self) -> Vec<Point> {
        self.history.iter().cloned().collect()
    }

    pub fn restore(&mut self, last_ts_ms: i64, history: Vec<Point>, open: Option<(i64, Accumulator)>) {
        self.last_processed_ms = last_ts_ms;
        self.history = history.into();
        if let Some((start, acc)) = open {
            self.cur_bucket_start = Some(start);
            self.cur_accumulator = acc;
        }
    }

    /// Process one `(timestamp_ms, observation, weight)` event, per the
    /// event-processing rules of spec.md §4.4. `weight` is vbytes for
    /// fee-rate windows and ignored otherwise.
    pub fn ingest(&mut self, timestamp_ms: i64, observation: i64, weight: i64) {
        if timestamp_ms <= self.last_processed_ms {
            return;
        }
        if observation <= 0 {
            return;
        }
        self.last_processed_ms = timestamp_ms;

        let b = (timestamp_ms / self.bucket_ms) * self.bucket_ms;
        match self.cur_bucket_start {
            None => {
                self.cur_bucket_start = Some(b);
                self.cur_accumulator.fold(observation, weight);
            }
            Some(cur) if b == cur => {
                self.cur_accumulator.fold(observation, weight);
            }
            Some(cur) => {
                self.finalize(cur);
                self.cur_bucket_start = Some(b);
                self.cur_accumulator = Accumulator::default();
                self.cur_accumulator.fold(observation, weight);
            }
        }
    }

    /// Idle-flush: called on every worker tick regardless of new events.
    /// If wall-clock has moved past the open bucket, finalize it.
    pub fn idle_flush(&mut self, now_ms: i64) {
        if let Some(cur) = self.cur_bucket_start {
            let next_start = cur + self.bucket_ms;
            if now_ms >= next_start {
                self.finalize(cur);
                self.cur_bucket_start = Some(next_start);
                self.cur_accumulator = Accumulator::default();
            }
        }
    }

    fn finalize(&mut self, bucket_start: i64) {
        if self.cur_accumulator.is_empty() {
            return;
        }
        let point = Point {
            x: bucket_start,
            y: self.cur_accumulator.derive(self.derivation),
        };
        // Tie-break on resume: overwrite the tail instead of appending a
        // duplicate x.
        if let Some(last) = self.history.back_mut() {
            if last.x == point.x {
                *last = point;
                return;
            }
        }
        self.history.push_back(point);
    }

    /// Trims the published series to `[latest - window_ms, latest]` and
    /// returns it as a compact array, per spec.md §4.4 publication rule.
    pub fn published_series(&mut self, latest_ms: i64) -> Vec<Point> {
        let floor = latest_ms - self.window_ms;
        while let Some(front) = self.history.front() {
            if front.x < floor {
                self.history.pop_front();
            } else {
                break;
            }
        }
        self.history.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalizes_bucket_on_boundary_crossing() {
        let mut w = BucketWindow::new(1_000, 10_000, Derivation::Sum);
        w.ingest(500, 10, 0);
        w.ingest(900, 5, 0);
        w.ingest(1_200, 7, 0);
        let series = w.published_series(1_200);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].x, 0);
        assert_eq!(series[0].y, 15.0);
    }

    #[test]
    fn drops_out_of_order_and_duplicate_timestamps() {
        let mut w = BucketWindow::new(1_000, 10_000, Derivation::Sum);
        w.ingest(1_000, 10, 0);
        w.ingest(1_000, 99, 0);
        w.ingest(500, 99, 0);
        assert_eq!(w.open_bucket().unwrap().1.sum, 10);
    }

    #[test]
    fn drops_non_positive_observations() {
        let mut w = BucketWindow::new(1_000, 10_000, Derivation::Sum);
        w.ingest(1_000, 0, 0);
        w.ingest(2_000, -5, 0);
        assert!(w.open_bucket().is_none());
    }

    #[test]
    fn fee_rate_derivation_divides_sum_by_weight() {
        let mut w = BucketWindow::new(1_000, 10_000, Derivation::FeeRate);
        w.ingest(500, 1_000, 250);
        w.ingest(1_200, 1, 1);
        let series = w.published_series(1_200);
        assert_eq!(series[0].y, 4.0);
    }

    #[test]
    fn idle_flush_finalizes_without_new_events() {
        let mut w = BucketWindow::new(1_000, 10_000, Derivation::Sum);
        w.ingest(500, 10, 0);
        w.idle_flush(1_600);
        let series = w.published_series(1_600);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].x, 0);
    }

    #[test]
    fn tie_break_overwrites_tail_on_resume() {
        let mut w = BucketWindow::new(1_000, 10_000, Derivation::Sum);
        w.restore(900, vec![Point { x: 0, y: 3.0 }], Some((0, Accumulator { sum: 3, weight: 0, count: 1 })));
        w.ingest(1_000, 4, 0);
        w.ingest(2_000, 1, 0);
        let series = w.published_series(2_000);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].y, 7.0);
    }

    #[test]
    fn retention_trims_to_window() {
        let mut w = BucketWindow::new(1_000, 2_000, Derivation::Sum);
        w.ingest(0, 1, 0);
        w.ingest(1_000, 1, 0);
        w.ingest(2_000, 1, 0);
        w.ingest(5_000, 1, 0);
        let series = w.published_series(5_000);
        assert!(series.iter().all(|p| p.x >= 3_000));
    }
}
