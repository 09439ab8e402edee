//! Ingest Workers (component C): per-domain loops that poll upstream and
//! write normalized state into the Shared Cache.

pub mod address;
pub mod blockchain_worker;
pub mod electrum_client;
pub mod lookup;
pub mod mempool_worker;
pub mod network_worker;
pub mod rpc_client;

pub use electrum_client::ElectrumClient;
pub use rpc_client::BitcoinRpcClient;
