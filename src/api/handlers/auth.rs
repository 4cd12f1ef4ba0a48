//! Registration, login, email verification and password reset.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{
    EmailRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    ResetPasswordRequest, TokenRequest, UserDto,
};
use crate::app_state::AppState;
use crate::error::{AppError, ErrorResponse};

const CHECK_INBOX: &str = "if the account exists, an email is on its way";

/// `POST /auth/register` — Create an account.
///
/// # Errors
///
/// Returns [`AppError::InvalidFields`] for bad input and
/// [`AppError::Conflict`] if the email is taken.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    summary = "Register",
    description = "Creates an account and emails a verification link valid for 24 hours.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserDto),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .auth
        .register(&req.email, &req.name, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(UserDto::from(&user))))
}

/// `POST /auth/login` — Exchange credentials for a bearer token.
///
/// # Errors
///
/// Returns [`AppError::Unauthorized`] for unknown emails and wrong
/// passwords alike.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse::from(session)))
}

/// `POST /auth/verify-email` — Confirm an email address.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for unknown or expired tokens.
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-email",
    tag = "Auth",
    summary = "Verify email",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Email verified", body = UserDto),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse),
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.verify_email(&req.token).await?;
    Ok(Json(UserDto::from(&user)))
}

/// `POST /auth/resend-verification` — Send a fresh verification link.
///
/// # Errors
///
/// Returns [`AppError`] only on storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/auth/resend-verification",
    tag = "Auth",
    summary = "Resend verification email",
    description = "Always succeeds so the response does not reveal whether an account exists.",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Accepted", body = MessageResponse),
    )
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.resend_verification(&req.email).await?;
    Ok(Json(MessageResponse::new(CHECK_INBOX)))
}

/// `POST /auth/forgot-password` — Email a password reset link.
///
/// # Errors
///
/// Returns [`AppError`] only on storage failure.
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    tag = "Auth",
    summary = "Request password reset",
    description = "Always succeeds so the response does not reveal whether an account exists. The link is valid for one hour.",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Accepted", body = MessageResponse),
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.forgot_password(&req.email).await?;
    Ok(Json(MessageResponse::new(CHECK_INBOX)))
}

/// `POST /auth/reset-password` — Set a new password with a reset token.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for unknown or expired tokens and
/// [`AppError::InvalidFields`] for a weak password.
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    tag = "Auth",
    summary = "Reset password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid token or password", body = ErrorResponse),
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.reset_password(&req.token, &req.password).await?;
    Ok(Json(MessageResponse::new("password updated")))
}

/// Auth routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-verification", post(resend_verification))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}
