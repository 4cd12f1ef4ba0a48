//! Registration, login and one-time token DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::user_dto::UserDto;
use crate::service::Session;

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Email address (case-insensitive).
    pub email: String,
    /// Display name.
    pub name: String,
    /// Password, at least 8 characters.
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Email address.
    pub email: String,
    /// Password.
    pub password: String,
}

/// Response body for `POST /auth/login`.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token for the `Authorization` header.
    pub access_token: String,
    /// Always `"Bearer"`.
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
    /// The logged-in user.
    pub user: UserDto,
}

impl From<Session> for LoginResponse {
    fn from(session: Session) -> Self {
        Self {
            access_token: session.access_token,
            token_type: "Bearer".to_string(),
            expires_in: session.expires_in,
            user: UserDto::from(&session.user),
        }
    }
}

/// Request body carrying an emailed token (`POST /auth/verify-email`).
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    /// Token from the email link.
    pub token: String,
}

/// Request body naming an account by email.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    /// Email address.
    pub email: String,
}

/// Request body for `POST /auth/reset-password`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    /// Token from the reset email.
    pub token: String,
    /// New password.
    pub password: String,
}
