//! Organizer balance, payout request and admin review DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{PayoutId, PayoutStatus};
use crate::persistence::models::{OrganizerBalance, Payout};

/// Response body for `GET /organizer/balance`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Σ organizer proceeds of settled payments.
    pub total_earned: i64,
    /// Σ payouts awaiting review.
    pub pending: i64,
    /// Σ approved payouts.
    pub withdrawn: i64,
    /// Amount that may still be requested.
    pub available: i64,
}

impl From<OrganizerBalance> for BalanceResponse {
    fn from(balance: OrganizerBalance) -> Self {
        Self {
            total_earned: balance.total_earned,
            pending: balance.pending,
            withdrawn: balance.withdrawn,
            available: balance.available(),
        }
    }
}

/// Request body for `POST /organizer/payouts`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PayoutRequest {
    /// Amount in kobo.
    pub amount: i64,
}

/// Query string for `GET /admin/payouts`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PayoutListParams {
    /// Only payouts in this state.
    pub status: Option<PayoutStatus>,
}

/// Request body for `POST /admin/payouts/bulk`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkPayoutRequest {
    /// Payouts to process; all must be pending.
    pub payout_ids: Vec<PayoutId>,
    /// `approve` or `reject`.
    pub action: String,
    /// Note stored on every payout and included in rejection emails.
    #[serde(default)]
    pub note: Option<String>,
}

/// Response body for `POST /admin/payouts/bulk`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkPayoutResponse {
    /// Number of payouts updated.
    pub updated: usize,
    /// The updated payouts.
    pub payouts: Vec<Payout>,
}
