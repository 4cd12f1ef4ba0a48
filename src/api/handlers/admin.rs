//! Administrator endpoints: payout review.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{BulkPayoutRequest, BulkPayoutResponse, PayoutListParams};
use crate::app_state::AppState;
use crate::error::{AppError, ErrorResponse};
use crate::persistence::models::Payout;
use crate::service::AuthUser;

/// `GET /admin/payouts` — Payouts for review.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/admin/payouts",
    tag = "Admin",
    summary = "List payouts",
    security(("bearer" = [])),
    params(PayoutListParams),
    responses(
        (status = 200, description = "Payouts, newest first", body = Vec<Payout>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Administrator access required", body = ErrorResponse),
    )
)]
pub async fn list_payouts(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<PayoutListParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.payouts.admin_list(&caller, params.status).await?))
}

/// `POST /admin/payouts/bulk` — Approve or reject pending payouts.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] if the action is unknown, the id
/// list is empty or repeats an id, or any payout is not pending. Nothing
/// is changed in that case.
#[utoipa::path(
    post,
    path = "/api/v1/admin/payouts/bulk",
    tag = "Admin",
    summary = "Bulk payout review",
    description = "Moves every listed payout from pending to approved or rejected in one transaction, then notifies each organizer by email. Email failures are logged and do not affect the response.",
    security(("bearer" = [])),
    request_body = BulkPayoutRequest,
    responses(
        (status = 200, description = "Payouts updated", body = BulkPayoutResponse),
        (status = 400, description = "Invalid action or non-pending payout in batch", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 403, description = "Administrator access required", body = ErrorResponse),
        (status = 404, description = "Unknown payout id", body = ErrorResponse),
    )
)]
pub async fn bulk_process(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<BulkPayoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payouts = state
        .payouts
        .bulk_process(&caller, &req.payout_ids, &req.action, req.note)
        .await?;
    Ok(Json(BulkPayoutResponse {
        updated: payouts.len(),
        payouts,
    }))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/payouts", get(list_payouts))
        .route("/admin/payouts/bulk", post(bulk_process))
}
