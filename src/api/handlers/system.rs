//! System endpoints: health check and fee schedule.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::FeeSchedule;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /config/fees` — The fee schedule applied at checkout.
#[utoipa::path(
    get,
    path = "/config/fees",
    tag = "System",
    summary = "Fee schedule",
    description = "Processor fee rate, surcharge threshold and amount, fee cap, platform share, and the accepted tolerance for client-submitted totals. Rates are basis points, amounts kobo.",
    responses(
        (status = 200, description = "Fee schedule", body = FeeSchedule),
    )
)]
pub async fn fees_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(*state.checkout.fees()))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/fees", get(fees_handler))
}
