//! HTTP ingestion of cluster events.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/events` | Handle one task state-change event |
//! | GET | `/healthz` | Liveness |
//!
//! The HTTP status of `/events` mirrors the result's `statusCode`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::debug;

use memlift_core::ClusterEvent;
use memlift_remediate::RemediationHandler;

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<RemediationHandler>,
}

#[derive(Serialize)]
struct Health<'a> {
    status: &'static str,
    cluster: &'a str,
}

/// Build the ingestion router.
pub fn build_router(handler: Arc<RemediationHandler>) -> Router {
    Router::new()
        .route("/events", post(handle_event))
        .route("/healthz", get(healthz))
        .with_state(AppState { handler })
}

async fn handle_event(
    State(state): State<AppState>,
    Json(event): Json<ClusterEvent>,
) -> impl IntoResponse {
    debug!(last_status = %event.detail.last_status, "event received");
    let result = state.handler.handle(&event).await;
    let status =
        StatusCode::from_u16(result.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(result))
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(Health {
        status: "ok",
        cluster: &state.handler.config().cluster,
    })
    .into_response()
}
