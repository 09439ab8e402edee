//! Coordination Primitives (component B): leader leases and request
//! coalescing with staleness tiers, per spec.md §4.2.

pub mod coalesce;
pub mod lease;

pub use coalesce::{CoalesceConfig, Coalescer};
pub use lease::Lease;
