//! Axum router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router:
///
/// - `GET /health` -- liveness and ingest id
/// - `GET /ws` -- `WebSocket` packet protocol
/// - `GET /rooms` -- room ids
/// - `POST /rooms` -- create a room from a template (organizers)
/// - `GET /sponsors` -- sponsor records
///
/// CORS allows any origin; the game client is served from another host.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(ws::ws_upgrade))
        .route("/rooms", get(handlers::list_rooms).post(handlers::create_room))
        .route("/sponsors", get(handlers::list_sponsors))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
