//! API Read Layer handlers (component G), per spec.md §4.7: pure cache
//! readers. A missing key for an upstream-backed view answers 503 with a
//! structured error envelope; a missing key for an empty series answers 200
//! with `{history: []}`. Only the address/transaction lookups drop down to
//! the coordination primitive.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::state::ApiState;
use crate::bucket::Point;
use crate::error::FabricError;
use crate::ingest::blockchain_worker::now_ms;
use crate::ingest::lookup::{lookup_address, lookup_transaction};
use crate::keys;

/// `{status: "error", error: "<kind>"}` for 400s / `{error: "<kind>"}` for
/// 503s, per spec.md §7.
fn error_response(status: StatusCode, err: &FabricError) -> Response {
    let body = if status == StatusCode::SERVICE_UNAVAILABLE {
        json!({ "error": err.kind() })
    } else {
        json!({ "status": "error", "error": err.kind() })
    };
    (status, Json(body)).into_response()
}

fn upstream_unavailable() -> Response {
    error_response(StatusCode::SERVICE_UNAVAILABLE, &FabricError::CacheUnavailable("key absent".into()))
}

/// Reads one JSON-valued key and serves it verbatim, or 503 if absent.
async fn read_required(state: &ApiState, key: &str) -> Response {
    match state.cache.get_json::<Value>(key).await {
        Ok(Some(v)) => Json(v).into_response(),
        Ok(None) => upstream_unavailable(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, &e),
    }
}

/// Reads a bucket-engine series key; an absent key is an empty series, not
/// an error, per spec.md §4.7.
async fn read_series(state: &ApiState, key: &str) -> Response {
    match state.cache.get_json::<Vec<Point>>(key).await {
        Ok(Some(series)) => Json(json!({ "history": series })).into_response(),
        Ok(None) => Json(json!({ "history": [] })).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, &e),
    }
}

pub async fn home_btc_price(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::HOME_BTC_PRICE_CACHE).await
}

pub async fn blockchain(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::BLOCKCHAIN_DYNAMIC_CACHE).await
}

pub async fn blockchain_static(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::BLOCKCHAIN_STATIC_KEY).await
}

pub async fn mempool(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::MEMPOOL_DYNAMIC_CACHE).await
}

pub async fn mempool_static(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::MEMPOOL_STATIC_KEY).await
}

pub async fn network2(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::NETWORK_DYNAMIC_CACHE).await
}

pub async fn network_nodes(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::NETWORK_NODES_CACHE_KEY).await
}

pub async fn network_miner(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::NETWORK_MINER_CACHE_KEY).await
}

pub async fn difficulty(State(state): State<ApiState>, Path(window): Path<String>) -> Response {
    let key = match window.as_str() {
        "1y" => keys::BTC_DIFFICULTY_1Y,
        "5y" => keys::BTC_DIFFICULTY_5Y,
        "10y" => keys::BTC_DIFFICULTY_10Y,
        "ever" => keys::BTC_DIFFICULTY_EVER,
        _ => return error_response(StatusCode::BAD_REQUEST, &FabricError::InvalidInput("unknown window".into())),
    };
    read_series(&state, key).await
}

pub async fn hashrate(State(state): State<ApiState>, Path(window): Path<String>) -> Response {
    let key = match window.as_str() {
        "1y" => keys::BTC_HASHRATE_1Y,
        "5y" => keys::BTC_HASHRATE_5Y,
        "10y" => keys::BTC_HASHRATE_10Y,
        "ever" => keys::BTC_HASHRATE_EVER,
        _ => return error_response(StatusCode::BAD_REQUEST, &FabricError::InvalidInput("unknown window".into())),
    };
    read_series(&state, key).await
}

pub async fn btc_tx_volume(State(state): State<ApiState>, Path(window): Path<String>) -> Response {
    read_series(&state, &keys::window_key(keys::BTC_TX_VOLUME_PREFIX, &window)).await
}

pub async fn btc_tx_volume_stats(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::BTC_TX_VOLUME_STATS).await
}

pub async fn btc_tx_fees(State(state): State<ApiState>, Path(window): Path<String>) -> Response {
    read_series(&state, &keys::window_key(keys::BTC_TX_FEES_PREFIX, &window)).await
}

pub async fn txamount_history(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::BTC_TX_AMOUNT_HISTORY_KEY).await
}

pub async fn btc_top(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::BTC_TOP_TXS_KEY).await
}

pub async fn btc_vol(State(state): State<ApiState>) -> Response {
    read_required(&state, keys::BTC_VOL_DYNAMIC_CACHE).await
}

pub async fn dashboard_traffic(State(state): State<ApiState>, Path(window): Path<String>) -> Response {
    match window.as_str() {
        "1h" | "24h" | "1w" | "1m" | "1y" => {}
        _ => return error_response(StatusCode::BAD_REQUEST, &FabricError::InvalidInput("unknown window".into())),
    }
    read_series(&state, &keys::window_key(keys::DASHBOARD_REQUESTS_PREFIX, &window)).await
}

/// All-time pageview count plus the live-session count, computed at query
/// time from the short-TTL session keys, per spec.md §9's "current
/// count-at-query-time" semantics for dashboard live sessions.
pub async fn home_traffic(State(state): State<ApiState>) -> Response {
    let total: f64 = match state.cache.get_json::<Vec<Point>>(keys::DASHBOARD_REQUESTS_EVER).await {
        Ok(Some(series)) => series.iter().map(|p| p.y).sum(),
        Ok(None) => 0.0,
        Err(e) => return error_response(StatusCode::SERVICE_UNAVAILABLE, &e),
    };
    let live = match state.cache.backend().scan(keys::DASHBOARD_ALIVE_PREFIX, 1000).await {
        Ok(keys) => keys.len(),
        Err(e) => return error_response(StatusCode::SERVICE_UNAVAILABLE, &e),
    };
    Json(json!({ "total": total as u64, "live": live })).into_response()
}

pub async fn system_health(State(state): State<ApiState>) -> Response {
    let stats: Vec<(&str, Option<Value>)> = futures::future::join_all([
        keys::BLOCKCHAIN_STATS_KEY,
        keys::MEMPOOL_STATS_KEY,
        keys::NETWORK_STATS_KEY,
        keys::BTC_TOP_STATS_KEY,
    ]
    .iter()
    .map(|k| {
        let cache = state.cache.clone();
        async move { (*k, cache.get_json::<Value>(k).await.ok().flatten()) }
    }))
    .await;

    let body: serde_json::Map<String, Value> = stats
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.unwrap_or(Value::Null)))
        .collect();
    Json(Value::Object(body)).into_response()
}

#[derive(Serialize)]
struct DashboardCore {
    blockchain: Option<Value>,
    mempool: Option<Value>,
    network: Option<Value>,
    btc_top: Option<Value>,
    btc_vol: Option<Value>,
    home_btc_price: Option<Value>,
}

/// One composite endpoint bundling the most-read keys, per spec.md §4.7.
pub async fn dashboard_core(State(state): State<ApiState>) -> Response {
    let (blockchain, mempool, network, btc_top, btc_vol, home_btc_price) = tokio::join!(
        state.cache.get_json::<Value>(keys::BLOCKCHAIN_DYNAMIC_CACHE),
        state.cache.get_json::<Value>(keys::MEMPOOL_DYNAMIC_CACHE),
        state.cache.get_json::<Value>(keys::NETWORK_DYNAMIC_CACHE),
        state.cache.get_json::<Value>(keys::BTC_TOP_TXS_KEY),
        state.cache.get_json::<Value>(keys::BTC_VOL_DYNAMIC_CACHE),
        state.cache.get_json::<Value>(keys::HOME_BTC_PRICE_CACHE),
    );

    Json(DashboardCore {
        blockchain: blockchain.ok().flatten(),
        mempool: mempool.ok().flatten(),
        network: network.ok().flatten(),
        btc_top: btc_top.ok().flatten(),
        btc_vol: btc_vol.ok().flatten(),
        home_btc_price: home_btc_price.ok().flatten(),
    })
    .into_response()
}

/// Resolves one address overview through the coalescer, shared by the
/// single-address and wallet (batch) handlers.
async fn resolve_address(state: &ApiState, addr: &str) -> crate::error::FabricResult<crate::ingest::lookup::AddressOverview> {
    let state_for_fetch = state.clone();
    let addr_for_fetch = addr.to_string();
    let cfg = crate::coordination::CoalesceConfig::new(
        format!("EXPLORER_ADDRESS_{addr}"),
        format!("EXPLORER_ADDRESS_LOCK_{addr}"),
    );
    state
        .lookup_coalescer
        .resolve(
            &cfg,
            || async move { lookup_address(&state_for_fetch.electrum, &addr_for_fetch).await.map_err(Into::into) },
            crate::ingest::lookup::AddressOverview {
                address: addr.to_string(),
                scripthash: String::new(),
                confirmed_sat: 0,
                unconfirmed_sat: 0,
                utxos: vec![],
                history: vec![],
            },
        )
        .await
}

pub async fn address(State(state): State<ApiState>, Path(addr): Path<String>) -> Response {
    match resolve_address(&state, &addr).await {
        Ok(overview) => Json(overview).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, &e),
    }
}

#[derive(Deserialize)]
pub struct WalletRequest {
    addresses: Vec<String>,
}

/// Batch address lookup, per spec.md §6/§7: one of the few handlers allowed
/// to hit the coordination primitive, with "too many addresses" as an
/// explicit 400 validation case.
pub async fn explorer_wallet(State(state): State<ApiState>, Json(body): Json<WalletRequest>) -> Response {
    if body.addresses.len() > state.max_wallet_addresses {
        return error_response(
            StatusCode::BAD_REQUEST,
            &FabricError::InvalidInput(format!("too many addresses: max {}", state.max_wallet_addresses)),
        );
    }

    let overviews = futures::future::join_all(body.addresses.iter().map(|addr| {
        let state = state.clone();
        async move { resolve_address(&state, addr).await.ok() }
    }))
    .await;

    Json(json!({ "addresses": overviews })).into_response()
}

pub async fn explorer_txid(State(state): State<ApiState>, Path(txid): Path<String>) -> Response {
    match lookup_transaction(&state.rpc, &txid).await {
        Ok(detail) => Json(detail).into_response(),
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, &FabricError::from(e)),
    }
}

/// Feeds one observation into the request-count Bucket Engine, per spec.md
/// §3's "dashboard request count" metric kind.
pub async fn track_pageview(State(state): State<ApiState>) -> StatusCode {
    let now = now_ms() as i64;
    let mut engine = state.traffic_engine.lock().await;
    engine.ingest(now, 1, 0);
    if let Err(e) = engine.tick(now).await {
        tracing::warn!(error = %e, "failed to publish dashboard request count");
    }
    StatusCode::NO_CONTENT
}

/// Marks one session alive via a short-TTL key; `/api/home_traffic`'s "live"
/// count is a prefix-scan over these keys at query time, never a running
/// counter, per spec.md §9.
pub async fn track_alive_post(State(state): State<ApiState>) -> Response {
    let session_id = Uuid::new_v4().to_string();
    let key = format!("{}{session_id}", keys::DASHBOARD_ALIVE_PREFIX);
    if let Err(e) = state
        .cache
        .set_bytes(&key, b"1", Some(Duration::from_secs(keys::DASHBOARD_ALIVE_TTL_SECONDS)))
        .await
    {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, &e);
    }
    Json(json!({ "session_id": session_id })).into_response()
}

pub async fn track_alive_get() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("X-Robots-Tag", HeaderValue::from_static("noindex"));
    (StatusCode::NO_CONTENT, headers).into_response()
}
