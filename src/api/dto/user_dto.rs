//! Profile DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Role, UserId};
use crate::persistence::models::{BankAccount, User};

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserDto {
    /// User id.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Account role.
    pub role: Role,
    /// Whether the email address is confirmed.
    pub email_verified: bool,
    /// Payout account, organizers only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<BankAccount>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            email_verified: user.is_verified(),
            bank_account: user.bank_account(),
            created_at: user.created_at,
        }
    }
}

/// Request body for `PATCH /users/me`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// New display name.
    pub name: String,
}
