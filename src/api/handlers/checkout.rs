//! Quote, checkout, payment verification and ticket admission.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CheckoutRequest, CheckoutResponse, QuoteRequest, QuoteResponse, VerifyResponse,
};
use crate::app_state::AppState;
use crate::domain::TicketId;
use crate::error::{AppError, ErrorResponse};
use crate::persistence::models::Ticket;
use crate::service::{AuthUser, CartItem, CheckoutOutcome};

/// `POST /checkout/quote` — Price a selection.
///
/// # Errors
///
/// Returns [`AppError::InvalidFields`] for malformed items and
/// [`AppError::Conflict`] when not enough tickets remain.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/quote",
    tag = "Checkout",
    summary = "Quote a selection",
    description = "Returns the fee breakdown for the selection without reserving anything.",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Breakdown", body = QuoteResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Sold out", body = ErrorResponse),
    )
)]
pub async fn quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let items: Vec<CartItem> = req.items.into_iter().map(Into::into).collect();
    let quote = state.checkout.quote(req.event_id, &items).await?;
    Ok(Json(QuoteResponse::from(quote)))
}

/// `POST /checkout` — Start a purchase.
///
/// # Errors
///
/// Returns [`AppError::AmountMismatch`] when the submitted total is more
/// than the tolerance away from the server total, and
/// [`AppError::PaymentGateway`] if the gateway cannot initialize the
/// transaction.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    tag = "Checkout",
    summary = "Checkout",
    description = "Prices the selection server-side and compares it with `amount`. Paid orders return a gateway URL; free orders are fulfilled immediately (201).",
    security(("bearer" = [])),
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Awaiting payment", body = CheckoutResponse),
        (status = 201, description = "Free tickets issued", body = CheckoutResponse),
        (status = 400, description = "Validation failed or amount mismatch", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
        (status = 409, description = "Sold out", body = ErrorResponse),
        (status = 502, description = "Payment gateway failure", body = ErrorResponse),
    )
)]
pub async fn checkout(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let items: Vec<CartItem> = req.items.into_iter().map(Into::into).collect();
    let outcome = state
        .checkout
        .checkout(&caller, req.event_id, &items, req.amount)
        .await?;
    let status = match outcome {
        CheckoutOutcome::AwaitingPayment { .. } => StatusCode::OK,
        CheckoutOutcome::Completed { .. } => StatusCode::CREATED,
    };
    Ok((status, Json(CheckoutResponse::from(outcome))))
}

/// `POST /checkout/{reference}/verify` — Confirm payment and issue tickets.
///
/// # Errors
///
/// Returns [`AppError::AmountMismatch`] if the gateway charged a different
/// amount, [`AppError::Conflict`] while the payment is still pending.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/{reference}/verify",
    tag = "Checkout",
    summary = "Verify payment",
    description = "Checks the transaction with the gateway and settles it. Repeating the call returns the same tickets.",
    security(("bearer" = [])),
    params(
        ("reference" = String, Path, description = "Payment reference"),
    ),
    responses(
        (status = 200, description = "Settled", body = VerifyResponse),
        (status = 400, description = "Payment failed or amount mismatch", body = ErrorResponse),
        (status = 403, description = "Not your payment", body = ErrorResponse),
        (status = 404, description = "Unknown reference", body = ErrorResponse),
        (status = 409, description = "Pending or sold out", body = ErrorResponse),
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let settlement = state.checkout.verify(&caller, &reference).await?;
    Ok(Json(VerifyResponse::from(settlement)))
}

/// `GET /tickets/{id}` — A single ticket.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] unless the caller holds the ticket,
/// organizes the event, or is an admin.
#[utoipa::path(
    get,
    path = "/api/v1/tickets/{id}",
    tag = "Tickets",
    summary = "Get ticket",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Ticket UUID"),
    ),
    responses(
        (status = 200, description = "Ticket", body = Ticket),
        (status = 403, description = "Not your ticket", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse),
    )
)]
pub async fn get_ticket(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<TicketId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.checkout.ticket(&caller, id).await?))
}

/// `POST /tickets/{id}/check-in` — Admit the holder.
///
/// # Errors
///
/// Returns [`AppError::Conflict`] for tickets that are already used.
#[utoipa::path(
    post,
    path = "/api/v1/tickets/{id}/check-in",
    tag = "Tickets",
    summary = "Check ticket in",
    security(("bearer" = [])),
    params(
        ("id" = uuid::Uuid, Path, description = "Ticket UUID"),
    ),
    responses(
        (status = 200, description = "Ticket used", body = Ticket),
        (status = 403, description = "Not the organizer", body = ErrorResponse),
        (status = 409, description = "Already used", body = ErrorResponse),
    )
)]
pub async fn check_in(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<TicketId>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.checkout.check_in(&caller, id).await?))
}

/// Checkout and ticket routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/quote", post(quote))
        .route("/checkout", post(checkout))
        .route("/checkout/{reference}/verify", post(verify))
        .route("/tickets/{id}", get(get_ticket))
        .route("/tickets/{id}/check-in", post(check_in))
}
