//! ElectrumX TCP JSON-lines client, per spec.md §6.
//!
//! A single long-lived object with an internal connection policy — no
//! per-call event-loop decision (spec.md §9 Design Notes). Grounded
//! line-by-line in `original_source/nodes/electrumx.py`'s `call` /
//! `call_batch`: each request is one JSON object, newline-terminated;
//! batches send multiple objects on one connection and match responses by
//! `id`.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::ElectrumConfig;
use crate::error::{BlockchainError, Result};

#[derive(Debug, Clone)]
pub struct ElectrumClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ElectrumClient {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn from_config(cfg: &ElectrumConfig) -> Self {
        Self::new(
            cfg.host.clone(),
            cfg.port,
            Duration::from_secs_f64(cfg.timeout_secs),
        )
    }

    async fn connect(&self) -> Result<TcpStream> {
        tokio::time::timeout(self.timeout, TcpStream::connect((self.host.as_str(), self.port)))
            .await
            .map_err(|_| BlockchainError::NetworkFailure("connect timed out".to_string()))?
            .map_err(|e| BlockchainError::NetworkFailure(e.to_string()))
    }

    /// One request, one response, one connection.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let mut results = self.call_batch(vec![(method, params)]).await?;
        Ok(results.remove(0))
    }

    /// Sends multiple JSON-RPC requests in one TCP connection, matched by
    /// `id`, preserving input order in the returned vector.
    pub async fn call_batch(&self, calls: Vec<(&str, Vec<Value>)>) -> Result<Vec<Value>> {
        let mut stream = self.connect().await?;

        let requests: Vec<Value> = calls
            .iter()
            .enumerate()
            .map(|(i, (method, params))| {
                json!({
                    "jsonrpc": "2.0",
                    "id": i + 1,
                    "method": method,
                    "params": params,
                })
            })
            .collect();

        let mut payload = String::new();
        for req in &requests {
            payload.push_str(&req.to_string());
            payload.push('\n');
        }

        tokio::time::timeout(self.timeout, stream.write_all(payload.as_bytes()))
            .await
            .map_err(|_| BlockchainError::NetworkFailure("write timed out".to_string()))?
            .map_err(|e| BlockchainError::NetworkFailure(e.to_string()))?;

        let mut reader = BufReader::new(stream);
        let mut results: HashMap<u64, Value> = HashMap::new();

        for _ in 0..requests.len() {
            let mut line = String::new();
            let n = tokio::time::timeout(self.timeout, reader.read_line(&mut line))
                .await
                .map_err(|_| BlockchainError::NetworkFailure("read timed out".to_string()))?
                .map_err(|e| BlockchainError::NetworkFailure(e.to_string()))?;
            if n == 0 {
                return Err(BlockchainError::NetworkFailure(
                    "connection closed before all responses arrived".to_string(),
                ));
            }

            let resp: Value = serde_json::from_str(line.trim())
                .map_err(|e| BlockchainError::DataInconsistency(e.to_string()))?;

            if let Some(err) = resp.get("error") {
                if !err.is_null() {
                    return Err(BlockchainError::Other(format!("ElectrumX error: {err}")));
                }
            }

            let id = resp
                .get("id")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| BlockchainError::DataInconsistency("response missing id".to_string()))?;
            results.insert(id, resp.get("result").cloned().unwrap_or(Value::Null));
        }

        (1..=requests.len() as u64)
            .map(|id| {
                results
                    .remove(&id)
                    .ok_or_else(|| BlockchainError::DataInconsistency(format!("missing response for id {id}")))
            })
            .collect()
    }

    pub async fn server_version(&self) -> Result<Value> {
        self.call("server.version", vec![json!("btc_fabric"), json!("1.4")])
            .await
    }

    pub async fn scripthash_get_balance(&self, scripthash: &str) -> Result<Value> {
        self.call("blockchain.scripthash.get_balance", vec![json!(scripthash)])
            .await
    }

    pub async fn scripthash_listunspent(&self, scripthash: &str) -> Result<Value> {
        self.call("blockchain.scripthash.listunspent", vec![json!(scripthash)])
            .await
    }

    pub async fn scripthash_get_history(&self, scripthash: &str) -> Result<Value> {
        self.call("blockchain.scripthash.get_history", vec![json!(scripthash)])
            .await
    }

    pub async fn transaction_get(&self, txid: &str, verbose: bool) -> Result<Value> {
        self.call("blockchain.transaction.get", vec![json!(txid), json!(verbose)])
            .await
    }

    /// One-shot: balance + utxos + history in a single TCP round-trip.
    pub async fn scripthash_overview(&self, scripthash: &str) -> Result<Value> {
        let mut results = self
            .call_batch(vec![
                ("blockchain.scripthash.get_balance", vec![json!(scripthash)]),
                ("blockchain.scripthash.listunspent", vec![json!(scripthash)]),
                ("blockchain.scripthash.get_history", vec![json!(scripthash)]),
            ])
            .await?;
        let history = results.pop().unwrap();
        let utxos = results.pop().unwrap();
        let balance = results.pop().unwrap();
        Ok(json!({ "balance": balance, "utxos": utxos, "history": history }))
    }
}
