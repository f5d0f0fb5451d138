//! Liveness- und Readiness-Endpunkte

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use nileauth_db::AuthStorage;
use serde_json::json;

use crate::state::AppState;

/// GET /health – Prozess laeuft
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// GET /ready – Speicher erreichbar
pub async fn ready<S: AuthStorage>(State(state): State<AppState<S>>) -> impl IntoResponse {
    if state.speicher.ping().await {
        (StatusCode::OK, Json(json!({ "ready": true })))
    } else {
        tracing::warn!("Readiness-Pruefung: Speicher nicht erreichbar");
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ready": false })))
    }
}
