//! On-demand address and transaction lookups (component C), serving the
//! explorer surface of the API. Unlike the three polling workers, these run
//! per-request: spec.md §4.3 describes address lookup as
//! address → scripthash → batched ElectrumX overview, and transaction
//! lookup as walking inputs to derive the fee paid.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BlockchainError, Result};
use crate::ingest::address::address_to_scripthash;
use crate::ingest::electrum_client::ElectrumClient;
use crate::ingest::rpc_client::BitcoinRpcClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_hash: String,
    pub tx_pos: u64,
    pub height: u64,
    pub value_sat: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tx_hash: String,
    pub height: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressOverview {
    pub address: String,
    pub scripthash: String,
    pub confirmed_sat: i64,
    pub unconfirmed_sat: i64,
    pub utxos: Vec<Utxo>,
    pub history: Vec<HistoryEntry>,
}

/// address → scripthash → one batched ElectrumX round-trip.
pub async fn lookup_address(electrum: &ElectrumClient, address: &str) -> Result<AddressOverview> {
    let scripthash = address_to_scripthash(address)?;
    let overview = electrum.scripthash_overview(&scripthash).await?;

    let balance = overview.get("balance").cloned().unwrap_or(Value::Null);
    let confirmed_sat = balance.get("confirmed").and_then(|v| v.as_i64()).unwrap_or(0);
    let unconfirmed_sat = balance.get("unconfirmed").and_then(|v| v.as_i64()).unwrap_or(0);

    let utxos = overview
        .get("utxos")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|u| {
                    Some(Utxo {
                        tx_hash: u.get("tx_hash")?.as_str()?.to_string(),
                        tx_pos: u.get("tx_pos")?.as_u64()?,
                        height: u.get("height").and_then(|h| h.as_u64()).unwrap_or(0),
                        value_sat: u.get("value")?.as_u64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let history = overview
        .get("history")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|h| {
                    Some(HistoryEntry {
                        tx_hash: h.get("tx_hash")?.as_str()?.to_string(),
                        height: h.get("height").and_then(|v| v.as_i64()).unwrap_or(0),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(AddressOverview {
        address: address.to_string(),
        scripthash,
        confirmed_sat,
        unconfirmed_sat,
        utxos,
        history,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub txid: String,
    pub is_coinbase: bool,
    pub input_value_sat: u64,
    pub output_value_sat: u64,
    pub fee_sat: u64,
    pub raw: Value,
}

/// Fetches a transaction and derives its fee by walking inputs: for each
/// non-coinbase input, fetch the referenced previous transaction to read the
/// spent output's value (`fee = sum(inputs) - sum(outputs)`, per spec.md
/// §4.3; a coinbase transaction's fee is defined as zero).
pub async fn lookup_transaction(rpc: &BitcoinRpcClient, txid: &str) -> Result<TransactionDetail> {
    let raw = rpc.get_raw_transaction_verbose(txid).await?;

    let vin = raw.get("vin").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    let vout = raw.get("vout").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    let is_coinbase = vin.first().map(|i| i.get("coinbase").is_some()).unwrap_or(false);

    let output_value_sat: u64 = vout
        .iter()
        .filter_map(|o| o.get("value").and_then(|v| v.as_f64()))
        .map(|btc| (btc * 1e8).round() as u64)
        .sum();

    if is_coinbase {
        return Ok(TransactionDetail {
            txid: txid.to_string(),
            is_coinbase: true,
            input_value_sat: 0,
            output_value_sat,
            fee_sat: 0,
            raw,
        });
    }

    let mut input_value_sat: u64 = 0;
    for input in &vin {
        let prev_txid = input
            .get("txid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BlockchainError::DataInconsistency("input missing txid".to_string()))?;
        let prev_vout = input
            .get("vout")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| BlockchainError::DataInconsistency("input missing vout".to_string()))?;

        let prev_tx = rpc.get_raw_transaction_verbose(prev_txid).await?;
        let spent_value_btc = prev_tx
            .get("vout")
            .and_then(|v| v.as_array())
            .and_then(|outs| outs.get(prev_vout as usize))
            .and_then(|o| o.get("value"))
            .and_then(|v| v.as_f64())
            .ok_or_else(|| BlockchainError::DataInconsistency("referenced output not found".to_string()))?;

        input_value_sat += (spent_value_btc * 1e8).round() as u64;
    }

    let fee_sat = input_value_sat.saturating_sub(output_value_sat);

    Ok(TransactionDetail {
        txid: txid.to_string(),
        is_coinbase: false,
        input_value_sat,
        output_value_sat,
        fee_sat,
        raw,
    })
}
