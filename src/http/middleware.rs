//! Request middleware: request ID, admission gate, in-flight tracking.
//!
//! # Responsibilities
//! - Inject `x-request-id` as early as possible for tracing
//! - Reject every request once shutdown has begun, before any other handling
//! - Tie one enter/settle pair to each admitted request's full lifetime
//!
//! # Design Decisions
//! - The gate sits outside the tracker: a rejected request never touches
//!   the counter
//! - The settle guard rides the response, so it fires whether the response
//!   completes or the client disconnects early, and only once

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::http::server::AppState;
use crate::observability::metrics;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Ensure every request carries an `x-request-id`.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    if !request.headers().contains_key(X_REQUEST_ID) {
        let id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            request.headers_mut().insert(X_REQUEST_ID, value);
        }
    }
    next.run(request).await
}

/// Boundary check run before any other request handling.
///
/// Once shutdown has begun the request is refused outright: `503` with a
/// retry hint and a `Connection: close` nudge so the client does not reuse
/// the transport connection. Rejected requests never enter the counter.
pub async fn admission_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.shutdown.is_shutting_down() {
        return next.run(request).await;
    }

    metrics::record_request_rejected();
    tracing::debug!(
        method = %request.method(),
        path = %request.uri().path(),
        "Rejected request during shutdown"
    );

    let mut response = (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "ok": false,
            "message": "Server is shutting down",
        })),
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::RETRY_AFTER, HeaderValue::from(state.retry_after_secs));
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

/// Wrap an admitted request in the request counter.
pub async fn track_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let guard = state.requests.enter();
    let mut response = next.run(request).await;
    // The guard travels with the response and settles when it is dropped:
    // after the response is written, or when the connection goes away first.
    response.extensions_mut().insert(guard);
    response
}
