//! Integration tests for the REST endpoints.
//!
//! Requests go straight into the Axum `Router` via `tower::ServiceExt`;
//! the store is in memory and no TCP listener is started.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use playground_core::auth::issue_token;
use playground_core::config::RoomTemplate;
use playground_core::{Context, Hub, Secrets, Services, Settings, world};
use playground_db::{Batch, MemoryStore, Store, keys};
use playground_server::{AppState, build_router};
use playground_types::{Character, HashRecord, IngestId, Role, Sponsor};
use serde_json::Value;
use tower::ServiceExt;

const SECRET: &str = "api-test-secret";

async fn make_test_state(store: Arc<MemoryStore>) -> Arc<AppState> {
    let mut settings = Settings::default();
    settings.rooms.templates.insert(
        "lounge".to_owned(),
        RoomTemplate {
            background: "lounge.svg".to_owned(),
            ..RoomTemplate::default()
        },
    );

    let ctx = Context::new(
        store.clone(),
        IngestId::generate(),
        settings,
        Secrets::with_jwt_secret(SECRET),
        Services::disabled(),
    );
    let (hub, handle) = Hub::new(ctx.clone());
    tokio::spawn(hub.run());

    world::create_room(store.as_ref(), "plaza", &RoomTemplate::default())
        .await
        .unwrap();
    for (id, role) in [("org", Role::Organizer), ("hack", Role::Hacker)] {
        let character = Character::new(id, id.to_uppercase(), role);
        store
            .apply(Batch::new().hset(keys::character(id), character.to_fields()))
            .await
            .unwrap();
    }

    Arc::new(AppState::new(ctx, handle))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn create_room_request(token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::post("/rooms").header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn health_reports_the_ingest() {
    let state = make_test_state(Arc::new(MemoryStore::new())).await;
    let ingest = state.ctx.ingest.to_string();

    let response = build_router(state)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["ingest"], ingest);
}

#[tokio::test]
async fn rooms_are_listed() {
    let state = make_test_state(Arc::new(MemoryStore::new())).await;

    let response = build_router(state)
        .oneshot(Request::get("/rooms").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!(["plaza"]));
}

#[tokio::test]
async fn creating_rooms_requires_a_token() {
    let state = make_test_state(Arc::new(MemoryStore::new())).await;
    let body = serde_json::json!({ "id": "lounge", "template": "lounge" });

    let response = build_router(state)
        .oneshot(create_room_request(None, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn creating_rooms_rejects_bad_tokens() {
    let state = make_test_state(Arc::new(MemoryStore::new())).await;
    let body = serde_json::json!({ "id": "lounge", "template": "lounge" });
    let forged = issue_token("some-other-secret", "org").unwrap();

    let response = build_router(state)
        .oneshot(create_room_request(Some(&forged), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn hackers_cannot_create_rooms() {
    let state = make_test_state(Arc::new(MemoryStore::new())).await;
    let body = serde_json::json!({ "id": "lounge", "template": "lounge" });
    let token = issue_token(SECRET, "hack").unwrap();

    let response = build_router(state)
        .oneshot(create_room_request(Some(&token), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn organizers_create_rooms_from_templates() {
    let store = Arc::new(MemoryStore::new());
    let state = make_test_state(store.clone()).await;
    let router = build_router(state);
    let token = issue_token(SECRET, "org").unwrap();

    let response = router
        .clone()
        .oneshot(create_room_request(
            Some(&token),
            &serde_json::json!({ "id": "lounge", "template": "lounge" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["id"], "lounge");
    assert_eq!(json["background"], "lounge.svg");
    assert!(world::room_exists(store.as_ref(), "lounge").await.unwrap());

    let again = router
        .clone()
        .oneshot(create_room_request(
            Some(&token),
            &serde_json::json!({ "id": "lounge", "template": "lounge" }),
        ))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let unknown = router
        .oneshot(create_room_request(
            Some(&token),
            &serde_json::json!({ "id": "attic", "template": "attic" }),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sponsors_are_listed_in_id_order() {
    let store = Arc::new(MemoryStore::new());
    let state = make_test_state(store.clone()).await;

    for (id, name) in [("zeta", "Zeta Corp"), ("acme", "Acme")] {
        let sponsor = Sponsor {
            id: id.to_owned(),
            name: name.to_owned(),
            queue_open: true,
            ..Sponsor::default()
        };
        store
            .apply(
                Batch::new()
                    .hset(keys::sponsor(id), sponsor.to_fields())
                    .sadd(keys::SPONSORS, id),
            )
            .await
            .unwrap();
    }

    let response = build_router(state)
        .oneshot(Request::get("/sponsors").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[0]["id"], "acme");
    assert_eq!(json[1]["name"], "Zeta Corp");
    assert_eq!(json[1]["queueOpen"], true);
}
