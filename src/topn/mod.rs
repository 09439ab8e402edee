//! Top-N Tracker (component E): current/ever top-K by value over the
//! mempool, per spec.md §4.5.

pub mod tracker;

pub use tracker::{LogRecord, TopNTracker, ValueEntry};
