//! Router assembly for the API Read Layer, per spec.md §6's representative
//! endpoint set. `tower-http`'s `TraceLayer` gives per-request structured
//! logging; `CorsLayer` implements the origin allow-listing named in
//! spec.md §1 Non-goals ("no request authentication beyond origin
//! allow-listing").

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::api::state::ApiState;

/// Builds an explicit origin allow-list from config, per spec.md §1's
/// "no request authentication beyond origin allow-listing". An empty list
/// (the default) allows no cross-origin browser requests at all; same-origin
/// requests are unaffected since CORS only governs cross-origin calls.
fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
}

pub fn build_router(state: ApiState, cors_allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/home_btc_price", get(handlers::home_btc_price))
        .route("/api/blockchain", get(handlers::blockchain))
        .route("/api/blockchain2", get(handlers::blockchain_static))
        .route("/api/mempool", get(handlers::mempool))
        .route("/api/mempool2", get(handlers::mempool_static))
        .route("/api/network2", get(handlers::network2))
        .route("/api/network/nodes", get(handlers::network_nodes))
        .route("/api/network/miner", get(handlers::network_miner))
        .route("/api/difficulty/{window}", get(handlers::difficulty))
        .route("/api/hashrate/{window}", get(handlers::hashrate))
        .route("/api/btc_tx_volume/stats", get(handlers::btc_tx_volume_stats))
        .route("/api/btc_tx_volume/{window}", get(handlers::btc_tx_volume))
        .route("/api/btc_tx_fees/{window}", get(handlers::btc_tx_fees))
        .route("/api/txamount/history", get(handlers::txamount_history))
        .route("/api/3_BTC_TOP", get(handlers::btc_top))
        .route("/api/BTC_VOL", get(handlers::btc_vol))
        .route("/api/address/{addr}", get(handlers::address))
        .route("/api/explorer_txid/{txid}", get(handlers::explorer_txid))
        .route("/api/dashboard_traffic/{window}", get(handlers::dashboard_traffic))
        .route("/api/home_traffic", get(handlers::home_traffic))
        .route("/api/track/dashboard_pageview", post(handlers::track_pageview))
        .route(
            "/api/track/dashboard_alive",
            post(handlers::track_alive_post).get(handlers::track_alive_get),
        )
        .route("/api/explorer_wallet", post(handlers::explorer_wallet))
        .route("/api/dashboard/core", get(handlers::dashboard_core))
        .route("/api/system-health", get(handlers::system_health))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(cors_allowed_origins))
        .with_state(state)
}
