//! The caller's own profile, tickets and favorites.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{UpdateProfileRequest, UserDto};
use crate::app_state::AppState;
use crate::error::{AppError, ErrorResponse};
use crate::persistence::models::{BankAccount, Event, Ticket};
use crate::service::AuthUser;

/// `GET /users/me` — The caller's profile.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] without a valid token.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    summary = "Current user",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Profile", body = UserDto),
        (status = 401, description = "Not logged in", body = ErrorResponse),
    )
)]
pub async fn me(State(state): State<AppState>, caller: AuthUser) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.profile(&caller).await?;
    Ok(Json(UserDto::from(&user)))
}

/// `PATCH /users/me` — Change the display name.
///
/// # Errors
///
/// Returns [`AppError::InvalidFields`] for an empty name.
#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    tag = "Users",
    summary = "Update profile",
    security(("bearer" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserDto),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse),
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.update_name(&caller, &req.name).await?;
    Ok(Json(UserDto::from(&user)))
}

/// `POST /users/me/organizer` — Become an organizer.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] until the email is verified and
/// [`AppError::InvalidFields`] for incomplete bank details.
#[utoipa::path(
    post,
    path = "/api/v1/users/me/organizer",
    tag = "Users",
    summary = "Become an organizer",
    description = "Stores payout bank details and grants the organizer role. Requires a verified email address.",
    security(("bearer" = [])),
    request_body = BankAccount,
    responses(
        (status = 200, description = "Upgraded profile", body = UserDto),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Email not verified", body = ErrorResponse),
    )
)]
pub async fn become_organizer(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(bank): Json<BankAccount>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.become_organizer(&caller, bank).await?;
    Ok(Json(UserDto::from(&user)))
}

/// `GET /users/me/tickets` — Tickets the caller holds.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] without a valid token.
#[utoipa::path(
    get,
    path = "/api/v1/users/me/tickets",
    tag = "Tickets",
    summary = "My tickets",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Tickets, newest first", body = Vec<Ticket>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
    )
)]
pub async fn my_tickets(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.checkout.my_tickets(&caller).await?))
}

/// `GET /users/me/favorites` — Events the caller saved.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] without a valid token.
#[utoipa::path(
    get,
    path = "/api/v1/users/me/favorites",
    tag = "Events",
    summary = "My favorite events",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Favorite events", body = Vec<Event>),
        (status = 401, description = "Not logged in", body = ErrorResponse),
    )
)]
pub async fn my_favorites(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.events.favorites(&caller).await?))
}

/// User routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me).patch(update_me))
        .route("/users/me/organizer", post(become_organizer))
        .route("/users/me/tickets", get(my_tickets))
        .route("/users/me/favorites", get(my_favorites))
}
