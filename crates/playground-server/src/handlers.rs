//! REST endpoint handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and ingest id |
//! | `GET` | `/rooms` | Room ids |
//! | `POST` | `/rooms` | Create a room from a template (organizers) |
//! | `GET` | `/sponsors` | Sponsor records |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use playground_core::{auth, world};
use playground_db::keys;
use playground_types::{Role, Sponsor};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /rooms`.
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    /// New room id.
    pub id: String,
    /// Template name from the `rooms.templates` settings.
    pub template: String,
}

/// `GET /health`.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "ingest": state.ctx.ingest.as_str(),
    }))
}

/// `GET /rooms`: every room id, sorted.
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(world::room_ids(state.ctx.store.as_ref()).await?))
}

/// `POST /rooms`: create a room. Requires an organizer's bearer token.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_organizer(&state, &headers).await?;

    let id = body.id.trim();
    if id.is_empty() || !id.is_ascii() {
        return Err(ApiError::BadRequest("room id must be non-empty ASCII".to_owned()));
    }
    let Some(template) = state.ctx.settings.rooms.templates.get(&body.template) else {
        return Err(ApiError::BadRequest(format!("unknown template {}", body.template)));
    };

    let store = state.ctx.store.as_ref();
    if world::room_exists(store, id).await? {
        return Err(ApiError::Conflict(format!("room {id} already exists")));
    }
    world::create_room(store, id, template).await?;
    tracing::info!(room = id, template = %body.template, "Room created over REST");

    Ok((StatusCode::CREATED, Json(world::room_snapshot(store, id).await?)))
}

/// `GET /sponsors`: every sponsor, sorted by id.
pub async fn list_sponsors(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Sponsor>>, ApiError> {
    let store = state.ctx.store.as_ref();
    let mut ids = store.smembers(keys::SPONSORS).await?;
    ids.sort();

    let mut sponsors = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(sponsor) = world::load_sponsor(store, &id).await? {
            sponsors.push(sponsor);
        }
    }
    Ok(Json(sponsors))
}

/// Check the `Authorization: Bearer` token belongs to an organizer.
async fn require_organizer(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let id = auth::verify_token(&state.ctx.secrets.jwt_secret, token.trim())
        .map_err(|_invalid| ApiError::Unauthorized)?;
    let character = world::load_character(state.ctx.store.as_ref(), &id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if character.role == Role::Organizer {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
