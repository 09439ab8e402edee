//! Aggregation and caching fabric for a Bitcoin node + ElectrumX ingest
//! pipeline: ingest workers normalize upstream data into a shared cache,
//! bucket engines and a top-N tracker derive rolling metrics, a snapshot
//! store makes that state durable, and a read-only HTTP API serves it.

pub mod api;
pub mod bucket;
pub mod cache;
pub mod config;
pub mod coordination;
pub mod error;
pub mod ingest;
pub mod keys;
pub mod metrics_worker;
pub mod snapshot;
pub mod supervisor;
pub mod topn;
