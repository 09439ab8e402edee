//! `fabric`: the Process Supervisor entrypoint. Each subcommand is an
//! independently deployable OS process (spec.md §4.8) sharing one cache and
//! one config loader.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use btc_fabric::api::{build_router, ApiState};
use btc_fabric::cache::{Cache, CacheBackend, MemoryCache, RedisCache};
use btc_fabric::config::{AppConfig, NodeRole};
use btc_fabric::ingest::blockchain_worker::BlockchainWorker;
use btc_fabric::ingest::mempool_worker::MempoolWorker;
use btc_fabric::ingest::network_worker::NetworkWorker;
use btc_fabric::ingest::{BitcoinRpcClient, ElectrumClient};
use btc_fabric::keys;
use btc_fabric::metrics_worker::MetricsWorker;
use btc_fabric::supervisor::Supervisor;

#[derive(Parser)]
#[command(name = "fabric", about = "Bitcoin node + ElectrumX aggregation fabric")]
struct Cli {
    #[arg(long, default_value = "env", global = true)]
    env_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Block height / hashrate / halving / winner-hash worker.
    Blockchain {
        #[arg(long, default_value = "full")]
        node: String,
    },
    /// Mempool size/fee/wait-time worker.
    Mempool {
        #[arg(long, default_value = "node2")]
        node: String,
    },
    /// Peer count / version worker.
    Network {
        #[arg(long, default_value = "node3")]
        node: String,
    },
    /// Top-N tracker plus tx-volume/tx-fees bucket engines.
    Metrics {
        #[arg(long, default_value = "full")]
        node: String,
    },
    /// Read-only HTTP API.
    Api,
}

async fn connect_cache(redis_url: &str) -> Cache {
    let backend: Arc<dyn CacheBackend> = match RedisCache::connect(redis_url).await {
        Ok(redis) => Arc::new(redis),
        Err(e) => {
            tracing::warn!(error = %e, "redis unavailable, falling back to in-process cache");
            MemoryCache::new()
        }
    };
    Cache::new(backend)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.env_dir)?;
    let cache = connect_cache(&config.redis_url).await;

    match cli.command {
        Command::Blockchain { node } => {
            let node_cfg = config.node_config(&node, NodeRole::Full)?;
            let rpc = BitcoinRpcClient::from_config(&node_cfg);
            let owner_id = uuid::Uuid::new_v4().to_string();
            let supervisor = Supervisor::acquire(
                cache.clone(),
                "fabric:blockchain:supervisor",
                owner_id,
                Duration::from_secs(keys::BLOCKCHAIN_LOCK_TTL_SECONDS),
            )
            .await?;
            let mut worker = BlockchainWorker::new(cache, rpc);
            supervisor.run(|| async move { worker.run().await }).await
        }
        Command::Mempool { node } => {
            let node_cfg = config.node_config(&node, NodeRole::Pruned)?;
            let rpc = BitcoinRpcClient::from_config(&node_cfg);
            let owner_id = uuid::Uuid::new_v4().to_string();
            let supervisor = Supervisor::acquire(
                cache.clone(),
                "fabric:mempool:supervisor",
                owner_id,
                Duration::from_secs(keys::BLOCKCHAIN_LOCK_TTL_SECONDS),
            )
            .await?;
            let mut worker = MempoolWorker::new(cache, rpc);
            supervisor.run(|| async move { worker.run().await }).await
        }
        Command::Network { node } => {
            let node_cfg = config.node_config(&node, NodeRole::Pruned)?;
            let rpc = BitcoinRpcClient::from_config(&node_cfg);
            let owner_id = uuid::Uuid::new_v4().to_string();
            let supervisor = Supervisor::acquire(
                cache.clone(),
                "fabric:network:supervisor",
                owner_id,
                Duration::from_secs(keys::BLOCKCHAIN_LOCK_TTL_SECONDS),
            )
            .await?;
            let mut worker = NetworkWorker::new(cache, rpc);
            supervisor.run(|| async move { worker.run().await }).await
        }
        Command::Metrics { node } => {
            let node_cfg = config.node_config(&node, NodeRole::Full)?;
            let rpc = BitcoinRpcClient::from_config(&node_cfg);
            let owner_id = uuid::Uuid::new_v4().to_string();
            let supervisor = Supervisor::acquire(
                cache.clone(),
                "fabric:metrics:supervisor",
                owner_id,
                Duration::from_secs(keys::BTC_TOP_LOCK_TTL_SECONDS),
            )
            .await?;
            let mut worker = MetricsWorker::new(cache, rpc, config.ramdisk_dir.clone(), config.snapshot_dir.clone());
            worker.restore().await;
            supervisor.run(|| async move { worker.run().await }).await
        }
        Command::Api => {
            let electrum = ElectrumClient::from_config(&config.electrum);
            let node_cfg = config.node_config("full", NodeRole::Full)?;
            let rpc = BitcoinRpcClient::from_config(&node_cfg);
            let state = ApiState::new(cache, electrum, rpc, &config);
            let router = build_router(state, &config.cors_allowed_origins);
            let listener = tokio::net::TcpListener::bind(&config.api_bind).await?;
            tracing::info!(addr = %config.api_bind, "api listening");
            axum::serve(listener, router).await?;
            Ok(())
        }
    }
}
