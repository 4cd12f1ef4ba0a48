//! Persistence layer: the [`Repository`] trait and its backends.
//!
//! Services only see `Arc<dyn Repository>`. The PostgreSQL backend
//! ([`postgres::PostgresRepository`]) is used in production; the in-memory
//! backend ([`memory::MemoryRepository`]) backs tests and local demos.
//!
//! Operations that must be atomic (event with its ticket types, ticket
//! issuance on settlement, balance-checked payout requests, bulk payout
//! transitions) are single trait methods so each backend can run them in
//! one transaction.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    EventId, EventStatus, PaymentId, PayoutId, PayoutStatus, Role, TicketId, TicketTypeId,
    TokenPurpose, UserId,
};
use crate::error::AppError;
use models::{
    BankAccount, Event, EventChanges, EventFilter, NewEvent, NewPayment, NewPayout,
    NewTicketType, NewUser, OrganizerBalance, Payment, Payout, PayoutFilter, Ticket, TicketType,
    User, VerificationToken,
};

/// Fields for a ticket issued on settlement.
#[derive(Debug, Clone)]
pub struct NewTicket {
    /// Admission code (unique).
    pub code: String,
    /// Ticket type being consumed.
    pub ticket_type_id: TicketTypeId,
}

/// Storage operations used by the services.
///
/// Lookups return `Ok(None)` for missing rows; the service decides whether
/// that is a 404. Mutations that target a specific row return
/// [`AppError::NotFound`] when it does not exist.
#[async_trait]
pub trait Repository: Send + Sync + std::fmt::Debug {
    // ── Users ──────────────────────────────────────────────────────────

    /// Inserts a user.
    ///
    /// # Errors
    ///
    /// [`AppError::Conflict`] if the email is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    /// Looks a user up by id.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError>;

    /// Looks a user up by (lowercased) email.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Updates the display name.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the user does not exist.
    async fn update_user_name(&self, id: UserId, name: &str) -> Result<User, AppError>;

    /// Marks the email address verified (no-op if already verified).
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the user does not exist.
    async fn mark_email_verified(&self, id: UserId, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Replaces the password hash.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the user does not exist.
    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), AppError>;

    /// Sets role and payout bank details.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the user does not exist.
    async fn update_organizer_profile(
        &self,
        id: UserId,
        role: Role,
        bank: &BankAccount,
    ) -> Result<User, AppError>;

    // ── One-time tokens ────────────────────────────────────────────────

    /// Stores a token, replacing earlier tokens of the same purpose for the
    /// same identifier.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn replace_token(&self, token: VerificationToken) -> Result<(), AppError>;

    /// Removes and returns the token with the given hash and purpose.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn take_token(
        &self,
        purpose: TokenPurpose,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, AppError>;

    // ── Events & ticket types ──────────────────────────────────────────

    /// Inserts an event together with its ticket types.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn create_event(
        &self,
        event: NewEvent,
        ticket_types: Vec<NewTicketType>,
    ) -> Result<(Event, Vec<TicketType>), AppError>;

    /// Looks an event up by id.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn find_event(&self, id: EventId) -> Result<Option<Event>, AppError>;

    /// Lists events matching the filter, soonest first, plus the total
    /// match count before pagination.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn list_events(&self, filter: &EventFilter) -> Result<(Vec<Event>, u64), AppError>;

    /// Applies descriptive changes.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the event does not exist.
    async fn update_event(&self, id: EventId, changes: EventChanges) -> Result<Event, AppError>;

    /// Sets the publication state.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the event does not exist.
    async fn set_event_status(&self, id: EventId, status: EventStatus)
    -> Result<Event, AppError>;

    /// Cancels an event and every `valid` ticket issued for it, in one
    /// step. Returns the event and the number of tickets cancelled.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the event does not exist.
    async fn cancel_event(&self, id: EventId) -> Result<(Event, u64), AppError>;

    /// Deletes an event with its ticket types, favorites and failed
    /// payments.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the event does not exist,
    /// [`AppError::Conflict`] if any ticket was sold or a `pending` or
    /// `success` payment references the event.
    async fn delete_event(&self, id: EventId) -> Result<(), AppError>;

    /// Adds a ticket type to an event.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the event does not exist.
    async fn add_ticket_type(
        &self,
        event_id: EventId,
        ticket_type: NewTicketType,
    ) -> Result<TicketType, AppError>;

    /// Ticket types of an event, in creation order.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn list_ticket_types(&self, event_id: EventId) -> Result<Vec<TicketType>, AppError>;

    /// Looks a ticket type up by id.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn find_ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>, AppError>;

    /// Deletes a ticket type that has sold nothing and is not part of a
    /// `pending` or `success` payment.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if missing, [`AppError::Conflict`] if any
    /// ticket of this type was sold or a live payment includes it.
    async fn delete_ticket_type(&self, id: TicketTypeId) -> Result<(), AppError>;

    // ── Favorites ──────────────────────────────────────────────────────

    /// Records a favorite. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn add_favorite(&self, user_id: UserId, event_id: EventId) -> Result<bool, AppError>;

    /// Removes a favorite. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn remove_favorite(&self, user_id: UserId, event_id: EventId)
    -> Result<bool, AppError>;

    /// Events favorited by a user, most recent favorite first.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn list_favorite_events(&self, user_id: UserId) -> Result<Vec<Event>, AppError>;

    // ── Payments & tickets ─────────────────────────────────────────────

    /// Inserts a pending payment.
    ///
    /// # Errors
    ///
    /// [`AppError::Conflict`] if the reference is already used.
    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, AppError>;

    /// Looks a payment up by gateway reference.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn find_payment_by_reference(&self, reference: &str)
    -> Result<Option<Payment>, AppError>;

    /// Settles a pending payment: increments sold counts (re-checking
    /// capacity), inserts the tickets and marks the payment `success`, all
    /// or nothing.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the payment or one of its ticket types is
    /// missing, [`AppError::Conflict`] if it is not pending, the event was
    /// cancelled or a ticket type would be oversold.
    async fn settle_payment(
        &self,
        reference: &str,
        tickets: Vec<NewTicket>,
        paid_at: DateTime<Utc>,
    ) -> Result<(Payment, Vec<Ticket>), AppError>;

    /// Moves a pending payment to `failed`.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if the payment is missing.
    async fn fail_payment(&self, reference: &str) -> Result<Payment, AppError>;

    /// Issues free tickets directly (no payment row), incrementing sold
    /// counts with the same capacity check as [`Repository::settle_payment`].
    ///
    /// # Errors
    ///
    /// [`AppError::Conflict`] if a ticket type would be oversold.
    async fn issue_free_tickets(
        &self,
        event_id: EventId,
        user_id: UserId,
        tickets: Vec<NewTicket>,
    ) -> Result<Vec<Ticket>, AppError>;

    /// Tickets issued to a payment.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn list_payment_tickets(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<Ticket>, AppError>;

    /// Tickets held by a user, newest first.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn list_user_tickets(&self, user_id: UserId) -> Result<Vec<Ticket>, AppError>;

    /// Looks a ticket up by id.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, AppError>;

    /// Marks a `valid` ticket `used`.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if missing, [`AppError::Conflict`] if the
    /// ticket is not valid.
    async fn check_in_ticket(&self, id: TicketId, at: DateTime<Utc>) -> Result<Ticket, AppError>;

    // ── Payouts ────────────────────────────────────────────────────────

    /// Earnings and payout totals of an organizer.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn organizer_balance(&self, organizer_id: UserId)
    -> Result<OrganizerBalance, AppError>;

    /// Inserts a pending payout if the organizer's available balance covers
    /// it. The balance check and insert are atomic.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidRequest`] if the amount exceeds the available
    /// balance.
    async fn create_payout(&self, payout: NewPayout) -> Result<Payout, AppError>;

    /// Payouts matching the filter, newest first.
    ///
    /// # Errors
    ///
    /// [`AppError::PersistenceError`] on storage failure.
    async fn list_payouts(&self, filter: PayoutFilter) -> Result<Vec<Payout>, AppError>;

    /// Moves every payout in `ids` from `from` to `to` atomically.
    ///
    /// Either all rows transition or none do.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] if any id is unknown,
    /// [`AppError::InvalidRequest`] if any payout is not in state `from`.
    async fn transition_payouts(
        &self,
        ids: &[PayoutId],
        from: PayoutStatus,
        to: PayoutStatus,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<Payout>, AppError>;
}

/// Message used when a batch contains a payout outside the expected state.
pub(crate) fn not_in_state_message(id: PayoutId, status: PayoutStatus, from: PayoutStatus) -> String {
    format!("payout {id} is {status}, only {from} payouts can be processed")
}

/// Message used when a ticket type would be oversold.
pub(crate) fn sold_out_message(name: &str) -> String {
    format!("not enough tickets left for {name}")
}
