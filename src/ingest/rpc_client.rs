//! Bitcoin node RPC client: JSON-RPC 1.0 over HTTP basic auth, per spec.md
//! §6. Grounded directly in the teacher's `BitcoinRpcClient` — same request
//! envelope, same `reqwest::Client`, same RPC-error-code mapping — extended
//! with the remaining methods spec.md names and a `NodeRole` guard mirroring
//! `original_source/nodes/rpc.py`'s `require_full_node`/`require_pruned_node`.

use serde_json::{json, Value};

use crate::config::{NodeConfig, NodeRole};
use crate::error::{BlockchainError, Result};

#[derive(Debug, Clone)]
pub struct BitcoinRpcClient {
    url: String,
    username: String,
    password: String,
    role: NodeRole,
    client: reqwest::Client,
}

impl BitcoinRpcClient {
    pub fn new(url: String, username: String, password: String, role: NodeRole) -> Self {
        BitcoinRpcClient {
            url,
            username,
            password,
            role,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(cfg: &NodeConfig) -> Self {
        Self::new(
            cfg.rpc_url(),
            cfg.rpc_user.clone(),
            cfg.rpc_password.clone(),
            cfg.role,
        )
    }

    pub fn require_full(&self) -> Result<()> {
        if self.role != NodeRole::Full {
            return Err(BlockchainError::InvalidInput(
                "full node required, but node is pruned".to_string(),
            ));
        }
        Ok(())
    }

    pub fn require_pruned(&self) -> Result<()> {
        if self.role != NodeRole::Pruned {
            return Err(BlockchainError::InvalidInput(
                "pruned node required, but node is full".to_string(),
            ));
        }
        Ok(())
    }

    /// Raw JSON-RPC 1.0 call with a per-call timeout, per spec.md §5
    /// ("Every upstream call carries a deadline").
    pub async fn rpc_call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = 1;
        let rpc_request_body = json!({
            "jsonrpc": "1.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&rpc_request_body)
            .timeout(std::time::Duration::from_secs(8))
            .send()
            .await
            .map_err(|e| BlockchainError::NetworkFailure(e.to_string()))?;

        let json_response: Value = response
            .json()
            .await
            .map_err(|e| BlockchainError::NetworkFailure(e.to_string()))?;

        if let Some(rpc_error) = json_response.get("error").and_then(|e| e.as_object()) {
            if !rpc_error.is_empty() {
                let code = rpc_error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
                let message = rpc_error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("Unknown RPC Error");

                return Err(match code {
                    -5 | -20 => BlockchainError::NotFound(message.to_string()),
                    -8 | -22 => BlockchainError::InvalidInput(message.to_string()),
                    -32603 => BlockchainError::Other(message.to_string()),
                    _ => BlockchainError::Other(format!("RPC error {code}: {message}")),
                });
            }
        }

        json_response.get("result").cloned().ok_or_else(|| {
            BlockchainError::DataInconsistency("No result found in response".to_string())
        })
    }

    pub async fn get_blockchain_info(&self) -> Result<Value> {
        self.rpc_call("getblockchaininfo", vec![]).await
    }

    pub async fn get_block(&self, hash: &str) -> Result<Value> {
        self.rpc_call("getblock", vec![json!(hash), json!(1)]).await
    }

    pub async fn get_mempool_info(&self) -> Result<Value> {
        self.rpc_call("getmempoolinfo", vec![]).await
    }

    pub async fn get_network_info(&self) -> Result<Value> {
        self.rpc_call("getnetworkinfo", vec![]).await
    }

    pub async fn get_raw_mempool_verbose(&self) -> Result<Value> {
        self.rpc_call("getrawmempool", vec![json!(true)]).await
    }

    pub async fn get_raw_transaction_verbose(&self, txid: &str) -> Result<Value> {
        self.rpc_call("getrawtransaction", vec![json!(txid), json!(1)])
            .await
    }
}
