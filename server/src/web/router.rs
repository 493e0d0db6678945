use std::sync::Arc;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::app_state::AppState;
use super::{rest_api, ws_handler};

/// Build the axum router with the WebSocket endpoint and the channel listing.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Any origin may connect; clients are browsers served from elsewhere.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .route("/groups", get(rest_api::list_groups))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
