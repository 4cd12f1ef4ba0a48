//! Database records, one struct per table.
//!
//! Status and role columns are `TEXT`; rows decode them through
//! `TryFrom<String>` (see [`crate::domain::status`]). Money columns are
//! `BIGINT` minor units.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    EventId, EventStatus, OrderLine, PaymentBreakdown, PaymentId, PaymentStatus, PayoutId,
    PayoutStatus, Role, TicketId, TicketStatus, TicketTypeId, TokenPurpose, UserId,
};

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Primary key.
    pub id: UserId,
    /// Lowercased, unique email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Account role.
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// When the email address was confirmed.
    pub email_verified_at: Option<DateTime<Utc>>,
    /// Payout bank name (organizers).
    pub bank_name: Option<String>,
    /// Payout account number (organizers).
    pub account_number: Option<String>,
    /// Payout account holder name (organizers).
    pub account_name: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Returns `true` once the email address has been confirmed.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Bank details for payouts, if all three fields are set.
    #[must_use]
    pub fn bank_account(&self) -> Option<BankAccount> {
        match (&self.bank_name, &self.account_number, &self.account_name) {
            (Some(bank_name), Some(account_number), Some(account_name)) => Some(BankAccount {
                bank_name: bank_name.clone(),
                account_number: account_number.clone(),
                account_name: account_name.clone(),
            }),
            _ => None,
        }
    }
}

/// Fields for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Lowercased email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Initial role.
    pub role: Role,
}

/// Payout destination account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize, ToSchema)]
pub struct BankAccount {
    /// Bank name.
    pub bank_name: String,
    /// Ten-digit account number.
    pub account_number: String,
    /// Account holder name.
    pub account_name: String,
}

/// A row from the `verification_tokens` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VerificationToken {
    /// Email address the token was issued to.
    pub identifier: String,
    /// SHA-256 of the emailed token, base64url.
    pub token_hash: String,
    /// What the token authorizes.
    #[sqlx(try_from = "String")]
    pub purpose: TokenPurpose,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

/// A row from the `events` table.
#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct Event {
    /// Primary key.
    pub id: EventId,
    /// Owning organizer.
    pub organizer_id: UserId,
    /// Title.
    pub title: String,
    /// Long description.
    pub description: Option<String>,
    /// Venue or address.
    pub venue: String,
    /// Free-form category (e.g. `"music"`).
    pub category: Option<String>,
    /// Start time.
    pub starts_at: DateTime<Utc>,
    /// End time.
    pub ends_at: Option<DateTime<Utc>>,
    /// Free events only carry zero-priced ticket types.
    pub is_free: bool,
    /// Publication state.
    #[sqlx(try_from = "String")]
    pub status: EventStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Owning organizer.
    pub organizer_id: UserId,
    /// Title.
    pub title: String,
    /// Long description.
    pub description: Option<String>,
    /// Venue.
    pub venue: String,
    /// Category.
    pub category: Option<String>,
    /// Start time.
    pub starts_at: DateTime<Utc>,
    /// End time.
    pub ends_at: Option<DateTime<Utc>>,
    /// Free event flag.
    pub is_free: bool,
}

/// Partial update of an event's descriptive fields. `None` keeps the
/// current value.
#[derive(Debug, Clone, Default)]
pub struct EventChanges {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New venue.
    pub venue: Option<String>,
    /// New category.
    pub category: Option<String>,
    /// New start time.
    pub starts_at: Option<DateTime<Utc>>,
    /// New end time.
    pub ends_at: Option<DateTime<Utc>>,
}

/// Query filter for event listings.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    /// Exact category.
    pub category: Option<String>,
    /// Restrict to one status.
    pub status: Option<EventStatus>,
    /// Restrict to one organizer.
    pub organizer_id: Option<UserId>,
    /// Page number, 1-indexed.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
}

impl EventFilter {
    /// Number of rows to skip for the requested page.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// A row from the `ticket_types` table.
#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct TicketType {
    /// Primary key.
    pub id: TicketTypeId,
    /// Parent event.
    pub event_id: EventId,
    /// Tier name (e.g. `"VIP"`).
    pub name: String,
    /// Unit price in minor units.
    pub price: i64,
    /// Capacity.
    pub quantity: i32,
    /// Tickets sold so far. Never exceeds `quantity`.
    pub sold: i32,
}

impl TicketType {
    /// Tickets still available.
    #[must_use]
    pub fn remaining(&self) -> i32 {
        (self.quantity - self.sold).max(0)
    }
}

/// Fields for inserting a ticket type.
#[derive(Debug, Clone)]
pub struct NewTicketType {
    /// Tier name.
    pub name: String,
    /// Unit price in minor units.
    pub price: i64,
    /// Capacity.
    pub quantity: i32,
}

/// A row from the `payments` table.
#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct Payment {
    /// Primary key.
    pub id: PaymentId,
    /// Unique reference shared with the payment gateway.
    pub reference: String,
    /// Buyer.
    pub user_id: UserId,
    /// Event the tickets belong to.
    pub event_id: EventId,
    /// Sum of ticket prices.
    pub subtotal: i64,
    /// Processor fee charged on top.
    pub processor_fee: i64,
    /// Amount charged to the buyer.
    pub total_amount: i64,
    /// Organizer proceeds.
    pub organizer_amount: i64,
    /// Platform share.
    pub platform_amount: i64,
    /// Settlement state.
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    /// Priced line items frozen at checkout.
    #[sqlx(json)]
    pub items: Vec<OrderLine>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Settlement timestamp.
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// The stored breakdown.
    #[must_use]
    pub fn breakdown(&self) -> PaymentBreakdown {
        PaymentBreakdown {
            subtotal: self.subtotal,
            processor_fee: self.processor_fee,
            total_amount: self.total_amount,
            organizer_amount: self.organizer_amount,
            platform_amount: self.platform_amount,
        }
    }
}

/// Fields for inserting a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Gateway reference.
    pub reference: String,
    /// Buyer.
    pub user_id: UserId,
    /// Event.
    pub event_id: EventId,
    /// Computed breakdown.
    pub breakdown: PaymentBreakdown,
    /// Priced line items.
    pub items: Vec<OrderLine>,
}

/// A row from the `tickets` table.
#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct Ticket {
    /// Primary key.
    pub id: TicketId,
    /// Unique admission code.
    pub code: String,
    /// Ticket type.
    pub ticket_type_id: TicketTypeId,
    /// Event.
    pub event_id: EventId,
    /// Holder.
    pub user_id: UserId,
    /// Settling payment; `None` for free tickets.
    pub payment_id: Option<PaymentId>,
    /// Admission state.
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
    /// Issue timestamp.
    pub created_at: DateTime<Utc>,
    /// Check-in timestamp.
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// A row from the `payouts` table.
#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct Payout {
    /// Primary key.
    pub id: PayoutId,
    /// Requesting organizer.
    pub organizer_id: UserId,
    /// Requested amount in minor units.
    pub amount: i64,
    /// Review state.
    #[sqlx(try_from = "String")]
    pub status: PayoutStatus,
    /// Administrator note recorded on review.
    pub note: Option<String>,
    /// Destination bank at request time.
    pub bank_name: String,
    /// Destination account number at request time.
    pub account_number: String,
    /// Destination account holder at request time.
    pub account_name: String,
    /// Request timestamp.
    pub created_at: DateTime<Utc>,
    /// Review timestamp.
    pub processed_at: Option<DateTime<Utc>>,
}

/// Fields for inserting a payout request.
#[derive(Debug, Clone)]
pub struct NewPayout {
    /// Requesting organizer.
    pub organizer_id: UserId,
    /// Requested amount.
    pub amount: i64,
    /// Destination account.
    pub bank: BankAccount,
}

/// Query filter for payout listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayoutFilter {
    /// Restrict to one organizer.
    pub organizer_id: Option<UserId>,
    /// Restrict to one status.
    pub status: Option<PayoutStatus>,
}

/// Money movements for one organizer, in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrganizerBalance {
    /// Σ organizer proceeds of settled payments.
    pub total_earned: i64,
    /// Σ payouts awaiting review.
    pub pending: i64,
    /// Σ approved payouts.
    pub withdrawn: i64,
}

impl OrganizerBalance {
    /// Amount that may still be requested.
    #[must_use]
    pub fn available(&self) -> i64 {
        self.total_earned - self.pending - self.withdrawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_excludes_pending_and_withdrawn() {
        let balance = OrganizerBalance {
            total_earned: 1_000_000,
            pending: 200_000,
            withdrawn: 300_000,
        };
        assert_eq!(balance.available(), 500_000);
    }

    #[test]
    fn remaining_never_negative() {
        let tt = TicketType {
            id: TicketTypeId::new(),
            event_id: EventId::new(),
            name: "Regular".into(),
            price: 500_000,
            quantity: 10,
            sold: 12,
        };
        assert_eq!(tt.remaining(), 0);
    }

    #[test]
    fn filter_offset() {
        let filter = EventFilter {
            page: 3,
            per_page: 20,
            ..EventFilter::default()
        };
        assert_eq!(filter.offset(), 40);
        let first = EventFilter {
            page: 0,
            per_page: 20,
            ..EventFilter::default()
        };
        assert_eq!(first.offset(), 0);
    }
}
