use axum::Router;
use axum::http::Method;
use axum::routing::{get, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS]);

    Router::new()
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics))
        .route("/api/live/players", get(routes::api::get_players))
        .route("/api/live/players/{account}", get(routes::api::get_player))
        .route("/api/live/markers", get(routes::api::get_markers))
        .route("/api/live/status", get(routes::api::get_status))
        .route("/api/live/context", post(routes::api::switch_context))
        .route("/api/live/viewport", put(routes::api::set_viewport))
        .route("/api/live/events", get(routes::sse::live_events))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
