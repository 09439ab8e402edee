//! Snapshot Store (component F): durable recovery state and the
//! day-partitioned append-only event log, per spec.md §4.6.

pub mod eventlog;
pub mod store;

pub use eventlog::EventLog;
pub use store::{is_degraded_day, BucketSnapshot, SnapshotStore};
