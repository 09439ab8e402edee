//! Bucket Engines (component D): tumbling-window aggregation over ingest
//! events, per spec.md §4.4.

pub mod engine;
pub mod window;

pub use engine::{BucketEngine, WindowSpec};
pub use window::{Accumulator, Derivation, Point};
