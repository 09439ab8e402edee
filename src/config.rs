//! Configuration (component I): per-role env file loading plus a typed
//! `AppConfig` assembled once at process start.
//!
//! Grounded in `original_source/nodes/config.py`'s `load_node_env` /
//! `make_node_config`: one `env/.env.<role>` file per Bitcoin node role,
//! loaded with `dotenvy` instead of `python-dotenv`. Missing credentials
//! are fatal, matching spec.md §6.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Full,
    Pruned,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub name: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub rpc_user: String,
    pub rpc_password: String,
    pub role: NodeRole,
}

impl NodeConfig {
    pub fn rpc_url(&self) -> String {
        format!("http://{}:{}/", self.rpc_host, self.rpc_port)
    }
}

#[derive(Debug, Clone)]
pub struct ElectrumConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: f64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env_dir: PathBuf,
    pub redis_url: String,
    pub api_bind: String,
    pub snapshot_dir: PathBuf,
    pub ramdisk_dir: PathBuf,
    pub electrum: ElectrumConfig,
    /// Origins allowed to make cross-origin requests to the API, per
    /// spec.md §1 ("no request authentication beyond origin allow-listing").
    pub cors_allowed_origins: Vec<String>,
}

/// Loads `env/.env.<role>` into the process environment (override = true,
/// matching the source's `load_dotenv(env_path, override=True)`).
fn load_node_env(env_dir: &Path, role: &str) -> Result<()> {
    let path = env_dir.join(format!(".env.{role}"));
    if !path.is_file() {
        bail!("[node_config] missing {}", path.display());
    }
    dotenvy::from_path_override(&path)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(())
}

fn env_var(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("missing required env var {key}"))
}

/// Builds one `NodeConfig` for the given role, loading that role's env file
/// first. Fatal if credentials are absent — there is no sensible default.
pub fn make_node_config(env_dir: &Path, role: &str, node_role: NodeRole) -> Result<NodeConfig> {
    load_node_env(env_dir, role)?;
    let rpc_user = env_var("RPC_USER")?;
    let rpc_password = env_var("RPC_PASSWORD")?;
    if rpc_user.is_empty() || rpc_password.is_empty() {
        bail!("[rpc:{role}] missing RPC credentials");
    }
    Ok(NodeConfig {
        name: role.to_string(),
        rpc_host: env::var("RPC_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        rpc_port: env_var("RPC_PORT")?.parse().context("RPC_PORT must be a u16")?,
        rpc_user,
        rpc_password,
        role: node_role,
    })
}

impl AppConfig {
    /// Assembled once at process start; threaded explicitly through worker
    /// constructors afterward, never re-read at call sites (spec.md §9).
    pub fn load(env_dir: impl Into<PathBuf>) -> Result<Self> {
        let env_dir = env_dir.into();
        Ok(Self {
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            api_bind: env::var("API_BIND").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            snapshot_dir: env::var("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/snapshots")),
            ramdisk_dir: env::var("RAMDISK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/ramdisk")),
            electrum: ElectrumConfig {
                host: env::var("ELECTRUMX_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
                port: env::var("ELECTRUMX_PORT")
                    .unwrap_or_else(|_| "50001".into())
                    .parse()
                    .context("ELECTRUMX_PORT must be a u16")?,
                timeout_secs: env::var("ELECTRUMX_TIMEOUT")
                    .unwrap_or_else(|_| "5".into())
                    .parse()
                    .context("ELECTRUMX_TIMEOUT must be a float")?,
            },
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            env_dir,
        })
    }

    pub fn node_config(&self, role: &str, node_role: NodeRole) -> Result<NodeConfig> {
        make_node_config(&self.env_dir, role, node_role)
    }
}
