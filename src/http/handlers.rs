//! Route handlers: probes and the user resource.
//!
//! # Design Decisions
//! - `/health` answers as long as the process is alive, shutdown included,
//!   so orchestration tooling can watch the drain
//! - `/ready` reports not-ready as soon as draining begins and when the
//!   store stops answering

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::server::AppState;
use crate::store::NewUser;

/// Liveness probe. Mounted outside the admission gate.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe. Consults the shutdown flag and the store.
pub async fn readiness(State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not-ready", "reason": "shutting down" })),
        )
            .into_response();
    }
    if state.store.ping().is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not-ready", "reason": "store unavailable" })),
        )
            .into_response();
    }
    Json(json!({ "status": "ready" })).into_response()
}

/// Fallback for unmatched paths. Mounted behind the admission gate like
/// every other non-probe route, so unknown paths are rejected during
/// shutdown instead of leaking a bare 404.
pub async fn not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "ok": false,
            "message": format!("Can't find {} on this server", uri.path()),
        })),
    )
        .into_response()
}

pub async fn list_users(State(state): State<AppState>) -> Response {
    match state.store.list_users() {
        Ok(users) => Json(users).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ok": false, "message": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> Response {
    match state.store.insert_user(new_user) {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ok": false, "message": e.to_string() })),
        )
            .into_response(),
    }
}
