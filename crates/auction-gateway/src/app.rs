use std::sync::Arc;

use auction_admission::AdmissionController;
use auction_cache::CacheClient;
use auction_queue::QueueClient;
use auction_store::StorePool;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::session::Sessions;

#[derive(Clone)]
pub struct AppState {
    pub cache: CacheClient,
    pub queue: QueueClient,
    pub store: Arc<StorePool>,
    pub admission: Arc<AdmissionController>,
    pub sessions: Arc<Sessions>,
    pub jwt_secret: Arc<String>,
}

/// The public surface: websocket upgrade, the HTTP bid fallback, and the
/// health check. Safe to expose on the same address clients connect to.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(crate::ws::handler))
        .route("/bids", post(crate::http::place_bid))
        .route("/healthz", get(crate::http::healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Unblock/stats are operator-only and carry no auth of their own, so this
/// router is served on a separate, internal-only bind address rather than
/// alongside the public one.
pub fn build_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/unblock", post(crate::http::admin_unblock))
        .route("/admin/stats", get(crate::http::admin_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
