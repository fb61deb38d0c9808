//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the websocket endpoint and the discussion REST
//! endpoints under a single Axum router, wrapped in CORS and request
//! tracing layers.

pub mod discussions;
pub mod ws;

use axum::Router;
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Build the application router.
///
/// An empty `cors_origins` allows any origin.
pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/ws", get(ws::handle_ws))
        .route("/api/discussions/project/{project_id}/boards", get(discussions::list_project_boards))
        .route("/api/discussions/boards", post(discussions::create_board))
        .route("/api/discussions/boards/{board_id}", get(discussions::get_board).put(discussions::update_board))
        .route("/api/discussions/boards/{board_id}/posts", get(discussions::list_board_posts))
        .route("/healthz", get(healthz))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "cors: ignoring invalid origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
