//! Organizer dashboard: own events, balance and withdrawals.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{BalanceResponse, EventListResponse, PaginationParams, PayoutRequest};
use crate::app_state::AppState;
use crate::error::{AppError, ErrorResponse};
use crate::persistence::models::Payout;
use crate::service::AuthUser;

/// `GET /organizer/events` — The caller's events in every state.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-organizers.
#[utoipa::path(
    get,
    path = "/api/v1/organizer/events",
    tag = "Organizer",
    summary = "My events",
    security(("bearer" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated events", body = EventListResponse),
        (status = 403, description = "Organizer account required", body = ErrorResponse),
    )
)]
pub async fn my_events(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = state.events.list_own(&caller, params.clamped()).await?;
    Ok(Json(EventListResponse::from(page)))
}

/// `GET /organizer/balance` — Earnings and withdrawals.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-organizers.
#[utoipa::path(
    get,
    path = "/api/v1/organizer/balance",
    tag = "Organizer",
    summary = "Balance",
    description = "available = total_earned - pending - withdrawn, all in kobo.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Balance", body = BalanceResponse),
        (status = 403, description = "Organizer account required", body = ErrorResponse),
    )
)]
pub async fn balance(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let balance = state.payouts.balance(&caller).await?;
    Ok(Json(BalanceResponse::from(balance)))
}

/// `POST /organizer/payouts` — Request a withdrawal.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] without bank details or when the
/// amount exceeds the available balance.
#[utoipa::path(
    post,
    path = "/api/v1/organizer/payouts",
    tag = "Organizer",
    summary = "Request payout",
    security(("bearer" = [])),
    request_body = PayoutRequest,
    responses(
        (status = 201, description = "Payout pending review", body = Payout),
        (status = 400, description = "Invalid amount or no bank details", body = ErrorResponse),
        (status = 403, description = "Organizer account required", body = ErrorResponse),
    )
)]
pub async fn request_payout(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<PayoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payout = state.payouts.request_payout(&caller, req.amount).await?;
    Ok((StatusCode::CREATED, Json(payout)))
}

/// `GET /organizer/payouts` — The caller's withdrawal history.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-organizers.
#[utoipa::path(
    get,
    path = "/api/v1/organizer/payouts",
    tag = "Organizer",
    summary = "My payouts",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Payouts, newest first", body = Vec<Payout>),
        (status = 403, description = "Organizer account required", body = ErrorResponse),
    )
)]
pub async fn my_payouts(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.payouts.list_own(&caller).await?))
}

/// Organizer routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/organizer/events", get(my_events))
        .route("/organizer/balance", get(balance))
        .route("/organizer/payouts", get(my_payouts).post(request_payout))
}
