//! PostgreSQL implementation of the persistence layer.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgExecutor, PgPoolOptions};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    BankAccount, Event, EventChanges, EventFilter, NewEvent, NewPayment, NewPayout,
    NewTicketType, NewUser, OrganizerBalance, Payment, Payout, PayoutFilter, Ticket, TicketType,
    User, VerificationToken,
};
use super::{NewTicket, Repository, not_in_state_message, sold_out_message};
use crate::config::DatabaseConfig;
use crate::domain::{
    EventId, EventStatus, PaymentId, PaymentStatus, PayoutId, PayoutStatus, Role, TicketId,
    TicketStatus, TicketTypeId, TokenPurpose, UserId,
};
use crate::error::AppError;

const USER_COLUMNS: &str = "id, email, name, password_hash, role, email_verified_at, \
     bank_name, account_number, account_name, created_at, updated_at";
const EVENT_COLUMNS: &str = "id, organizer_id, title, description, venue, category, \
     starts_at, ends_at, is_free, status, created_at, updated_at";
const TICKET_TYPE_COLUMNS: &str = "id, event_id, name, price, quantity, sold";
const PAYMENT_COLUMNS: &str = "id, reference, user_id, event_id, subtotal, processor_fee, \
     total_amount, organizer_amount, platform_amount, status, items, created_at, paid_at";
const TICKET_COLUMNS: &str =
    "id, code, ticket_type_id, event_id, user_id, payment_id, status, created_at, checked_in_at";
const PAYOUT_COLUMNS: &str = "id, organizer_id, amount, status, note, bank_name, \
     account_number, account_name, created_at, processed_at";

/// PostgreSQL-backed repository using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::PersistenceError`] if the database is unreachable
    /// or a migration fails.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await?;

        tracing::info!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::PersistenceError(e.to_string()))?;

        Ok(Self::new(pool))
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps a unique-constraint violation to [`AppError::Conflict`].
fn conflict_on_unique(err: sqlx::Error, message: String) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message),
        _ => err.into(),
    }
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

async fn fetch_balance<'e, E: PgExecutor<'e>>(
    executor: E,
    organizer_id: UserId,
) -> Result<OrganizerBalance, AppError> {
    let (total_earned, pending, withdrawn) = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT
            COALESCE((SELECT SUM(p.organizer_amount) FROM payments p
                      JOIN events e ON e.id = p.event_id
                      WHERE e.organizer_id = $1 AND p.status = 'success'), 0)::BIGINT,
            COALESCE((SELECT SUM(amount) FROM payouts
                      WHERE organizer_id = $1 AND status = 'pending'), 0)::BIGINT,
            COALESCE((SELECT SUM(amount) FROM payouts
                      WHERE organizer_id = $1 AND status = 'approved'), 0)::BIGINT
        "#,
    )
    .bind(organizer_id)
    .fetch_one(executor)
    .await?;

    Ok(OrganizerBalance {
        total_earned,
        pending,
        withdrawn,
    })
}

/// Increments sold counts and inserts tickets inside an open transaction.
///
/// Ticket types are locked in id order so concurrent settlements touching
/// the same types cannot deadlock.
async fn issue_tickets(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event_id: EventId,
    user_id: UserId,
    payment_id: Option<PaymentId>,
    tickets: Vec<NewTicket>,
    now: DateTime<Utc>,
) -> Result<Vec<Ticket>, AppError> {
    // Blocks a concurrent `cancel_event` until issuance commits.
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM events WHERE id = $1 FOR SHARE",
    )
    .bind(event_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::not_found(format!("event {event_id}")))?;
    if status == EventStatus::Cancelled.as_str() {
        return Err(AppError::Conflict(format!("event {event_id} is cancelled")));
    }

    let mut wanted: BTreeMap<TicketTypeId, i32> = BTreeMap::new();
    for ticket in &tickets {
        *wanted.entry(ticket.ticket_type_id).or_default() += 1;
    }

    for (tt_id, count) in &wanted {
        let updated = sqlx::query(
            "UPDATE ticket_types SET sold = sold + $3 \
             WHERE id = $1 AND event_id = $2 AND sold + $3 <= quantity",
        )
        .bind(tt_id)
        .bind(event_id)
        .bind(count)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            let name = sqlx::query_scalar::<_, String>(
                "SELECT name FROM ticket_types WHERE id = $1 AND event_id = $2",
            )
            .bind(tt_id)
            .bind(event_id)
            .fetch_optional(&mut **tx)
            .await?;
            return Err(match name {
                Some(name) => AppError::Conflict(sold_out_message(&name)),
                None => AppError::not_found(format!("ticket type {tt_id}")),
            });
        }
    }

    let mut issued = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        let row = sqlx::query_as::<_, Ticket>(&format!(
            "INSERT INTO tickets (id, code, ticket_type_id, event_id, user_id, payment_id, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {TICKET_COLUMNS}"
        ))
        .bind(TicketId::new())
        .bind(&ticket.code)
        .bind(ticket.ticket_type_id)
        .bind(event_id)
        .bind(user_id)
        .bind(payment_id)
        .bind(TicketStatus::Valid.as_str())
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| conflict_on_unique(e, format!("ticket code {} already issued", ticket.code)))?;
        issued.push(row);
    }
    Ok(issued)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, name, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(UserId::new())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("email {} is already registered", user.email)))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user_name(&self, id: UserId, name: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {id}")))
    }

    async fn mark_email_verified(&self, id: UserId, at: DateTime<Utc>) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET email_verified_at = COALESCE(email_verified_at, $2), updated_at = $2 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("user {id}")));
        }
        Ok(())
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("user {id}")));
        }
        Ok(())
    }

    async fn update_organizer_profile(
        &self,
        id: UserId,
        role: Role,
        bank: &BankAccount,
    ) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, bank_name = $3, account_number = $4, account_name = $5, \
             updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .bind(&bank.bank_name)
        .bind(&bank.account_number)
        .bind(&bank.account_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {id}")))
    }

    async fn replace_token(&self, token: VerificationToken) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO verification_tokens (identifier, token_hash, purpose, expires_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (identifier, purpose) \
             DO UPDATE SET token_hash = EXCLUDED.token_hash, expires_at = EXCLUDED.expires_at",
        )
        .bind(&token.identifier)
        .bind(&token.token_hash)
        .bind(token.purpose.as_str())
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take_token(
        &self,
        purpose: TokenPurpose,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, AppError> {
        let token = sqlx::query_as::<_, VerificationToken>(
            "DELETE FROM verification_tokens WHERE purpose = $1 AND token_hash = $2 \
             RETURNING identifier, token_hash, purpose, expires_at",
        )
        .bind(purpose.as_str())
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn create_event(
        &self,
        event: NewEvent,
        ticket_types: Vec<NewTicketType>,
    ) -> Result<(Event, Vec<TicketType>), AppError> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events (id, organizer_id, title, description, venue, category, \
             starts_at, ends_at, is_free, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {EVENT_COLUMNS}"
        ))
        .bind(EventId::new())
        .bind(event.organizer_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.venue)
        .bind(&event.category)
        .bind(event.starts_at)
        .bind(event.ends_at)
        .bind(event.is_free)
        .bind(EventStatus::Draft.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let mut types = Vec::with_capacity(ticket_types.len());
        for tt in ticket_types {
            let row = sqlx::query_as::<_, TicketType>(&format!(
                "INSERT INTO ticket_types (id, event_id, name, price, quantity) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING {TICKET_TYPE_COLUMNS}"
            ))
            .bind(TicketTypeId::new())
            .bind(record.id)
            .bind(&tt.name)
            .bind(tt.price)
            .bind(tt.quantity)
            .fetch_one(&mut *tx)
            .await?;
            types.push(row);
        }

        tx.commit().await?;
        Ok((record, types))
    }

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<(Vec<Event>, u64), AppError> {
        const WHERE: &str = "WHERE ($1::TEXT IS NULL OR title ILIKE $1) \
             AND ($2::TEXT IS NULL OR category = $2) \
             AND ($3::TEXT IS NULL OR status = $3) \
             AND ($4::UUID IS NULL OR organizer_id = $4)";

        let search = filter.search.as_deref().map(like_pattern);
        let status = filter.status.map(|s| s.as_str());

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM events {WHERE}"))
            .bind(&search)
            .bind(&filter.category)
            .bind(status)
            .bind(filter.organizer_id)
            .fetch_one(&self.pool)
            .await?;

        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events {WHERE} \
             ORDER BY starts_at ASC, created_at ASC LIMIT $5 OFFSET $6"
        ))
        .bind(&search)
        .bind(&filter.category)
        .bind(status)
        .bind(filter.organizer_id)
        .bind(i64::from(filter.per_page))
        .bind(i64::from(filter.offset()))
        .fetch_all(&self.pool)
        .await?;

        Ok((events, u64::try_from(total).unwrap_or_default()))
    }

    async fn update_event(&self, id: EventId, changes: EventChanges) -> Result<Event, AppError> {
        sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                venue = COALESCE($4, venue),
                category = COALESCE($5, category),
                starts_at = COALESCE($6, starts_at),
                ends_at = COALESCE($7, ends_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.venue)
        .bind(changes.category)
        .bind(changes.starts_at)
        .bind(changes.ends_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("event {id}")))
    }

    async fn set_event_status(
        &self,
        id: EventId,
        status: EventStatus,
    ) -> Result<Event, AppError> {
        sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("event {id}")))
    }

    async fn cancel_event(&self, id: EventId) -> Result<(Event, u64), AppError> {
        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(EventStatus::Cancelled.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("event {id}")))?;

        let cancelled = sqlx::query(
            "UPDATE tickets SET status = $2 WHERE event_id = $1 AND status = $3",
        )
        .bind(id)
        .bind(TicketStatus::Cancelled.as_str())
        .bind(TicketStatus::Valid.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok((event, cancelled))
    }

    async fn delete_event(&self, id: EventId) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(format!("event {id}")))?;

        let sold = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM ticket_types WHERE event_id = $1 AND sold > 0)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if sold {
            return Err(AppError::Conflict(
                "events with sold tickets cannot be deleted".into(),
            ));
        }

        let live = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM payments WHERE event_id = $1 AND status IN ($2, $3))",
        )
        .bind(id)
        .bind(PaymentStatus::Pending.as_str())
        .bind(PaymentStatus::Success.as_str())
        .fetch_one(&mut *tx)
        .await?;
        if live {
            return Err(AppError::Conflict(format!(
                "event {id} has payments in progress"
            )));
        }

        sqlx::query("DELETE FROM payments WHERE event_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add_ticket_type(
        &self,
        event_id: EventId,
        ticket_type: NewTicketType,
    ) -> Result<TicketType, AppError> {
        let result = sqlx::query_as::<_, TicketType>(&format!(
            "INSERT INTO ticket_types (id, event_id, name, price, quantity) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {TICKET_TYPE_COLUMNS}"
        ))
        .bind(TicketTypeId::new())
        .bind(event_id)
        .bind(&ticket_type.name)
        .bind(ticket_type.price)
        .bind(ticket_type.quantity)
        .fetch_one(&self.pool)
        .await;

        match result {
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(AppError::not_found(format!("event {event_id}")))
            }
            other => Ok(other?),
        }
    }

    async fn list_ticket_types(&self, event_id: EventId) -> Result<Vec<TicketType>, AppError> {
        let types = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE event_id = $1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(types)
    }

    async fn find_ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>, AppError> {
        let tt = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tt)
    }

    async fn delete_ticket_type(&self, id: TicketTypeId) -> Result<(), AppError> {
        let result = sqlx::query(
            "DELETE FROM ticket_types t WHERE t.id = $1 AND t.sold = 0 \
             AND NOT EXISTS (SELECT 1 FROM payments p WHERE p.event_id = t.event_id \
             AND p.status IN ($2, $3) \
             AND p.items @> jsonb_build_array(jsonb_build_object('ticket_type_id', t.id)))",
        )
        .bind(id)
        .bind(PaymentStatus::Pending.as_str())
        .bind(PaymentStatus::Success.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.find_ticket_type(id).await? {
            Some(tt) if tt.sold > 0 => Err(AppError::Conflict(format!(
                "ticket type {} already has sales",
                tt.name
            ))),
            Some(tt) => Err(AppError::Conflict(format!(
                "ticket type {} has payments in progress",
                tt.name
            ))),
            None => Err(AppError::not_found(format!("ticket type {id}"))),
        }
    }

    async fn add_favorite(&self, user_id: UserId, event_id: EventId) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO favorites (user_id, event_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(event_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(AppError::not_found(format!("event {event_id}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn remove_favorite(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND event_id = $2")
            .bind(user_id)
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_favorite_events(&self, user_id: UserId) -> Result<Vec<Event>, AppError> {
        let columns = EVENT_COLUMNS
            .split(", ")
            .map(|c| format!("e.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {columns} FROM favorites f JOIN events e ON e.id = f.event_id \
             WHERE f.user_id = $1 ORDER BY f.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, AppError> {
        let b = payment.breakdown;
        sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (id, reference, user_id, event_id, subtotal, processor_fee, \
             total_amount, organizer_amount, platform_amount, status, items) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(PaymentId::new())
        .bind(&payment.reference)
        .bind(payment.user_id)
        .bind(payment.event_id)
        .bind(b.subtotal)
        .bind(b.processor_fee)
        .bind(b.total_amount)
        .bind(b.organizer_amount)
        .bind(b.platform_amount)
        .bind(PaymentStatus::Pending.as_str())
        .bind(Json(&payment.items))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::not_found(format!("event {}", payment.event_id))
            }
            _ => conflict_on_unique(
                e,
                format!("payment reference {} already exists", payment.reference),
            ),
        })
    }

    async fn find_payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    async fn settle_payment(
        &self,
        reference: &str,
        tickets: Vec<NewTicket>,
        paid_at: DateTime<Utc>,
    ) -> Result<(Payment, Vec<Ticket>), AppError> {
        let mut tx = self.pool.begin().await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1 FOR UPDATE"
        ))
        .bind(reference)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("payment {reference}")))?;

        if payment.status != PaymentStatus::Pending {
            return Err(AppError::Conflict(format!(
                "payment {reference} is already {}",
                payment.status
            )));
        }

        let issued = issue_tickets(
            &mut tx,
            payment.event_id,
            payment.user_id,
            Some(payment.id),
            tickets,
            paid_at,
        )
        .await?;

        let settled = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET status = $2, paid_at = $3 WHERE id = $1 RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment.id)
        .bind(PaymentStatus::Success.as_str())
        .bind(paid_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((settled, issued))
    }

    async fn fail_payment(&self, reference: &str) -> Result<Payment, AppError> {
        sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET status = CASE WHEN status = 'pending' THEN $2 ELSE status END \
             WHERE reference = $1 RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(reference)
        .bind(PaymentStatus::Failed.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("payment {reference}")))
    }

    async fn issue_free_tickets(
        &self,
        event_id: EventId,
        user_id: UserId,
        tickets: Vec<NewTicket>,
    ) -> Result<Vec<Ticket>, AppError> {
        let mut tx = self.pool.begin().await?;
        let issued = issue_tickets(&mut tx, event_id, user_id, None, tickets, Utc::now()).await?;
        tx.commit().await?;
        Ok(issued)
    }

    async fn list_payment_tickets(&self, payment_id: PaymentId) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE payment_id = $1 ORDER BY created_at, code"
        ))
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn list_user_tickets(&self, user_id: UserId) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn check_in_ticket(&self, id: TicketId, at: DateTime<Utc>) -> Result<Ticket, AppError> {
        let updated = sqlx::query_as::<_, Ticket>(&format!(
            "UPDATE tickets SET status = $2, checked_in_at = $3 \
             WHERE id = $1 AND status = $4 RETURNING {TICKET_COLUMNS}"
        ))
        .bind(id)
        .bind(TicketStatus::Used.as_str())
        .bind(at)
        .bind(TicketStatus::Valid.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ticket) = updated {
            return Ok(ticket);
        }
        match self.find_ticket(id).await? {
            Some(ticket) => Err(AppError::Conflict(format!(
                "ticket {id} is {}",
                ticket.status
            ))),
            None => Err(AppError::not_found(format!("ticket {id}"))),
        }
    }

    async fn organizer_balance(
        &self,
        organizer_id: UserId,
    ) -> Result<OrganizerBalance, AppError> {
        fetch_balance(&self.pool, organizer_id).await
    }

    async fn create_payout(&self, payout: NewPayout) -> Result<Payout, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent requests from the same organizer.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(payout.organizer_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {}", payout.organizer_id)))?;

        let available = fetch_balance(&mut *tx, payout.organizer_id)
            .await?
            .available();
        if payout.amount > available {
            return Err(AppError::InvalidRequest(format!(
                "requested {} exceeds available balance {available}",
                payout.amount
            )));
        }

        let record = sqlx::query_as::<_, Payout>(&format!(
            "INSERT INTO payouts (id, organizer_id, amount, status, bank_name, account_number, account_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {PAYOUT_COLUMNS}"
        ))
        .bind(PayoutId::new())
        .bind(payout.organizer_id)
        .bind(payout.amount)
        .bind(PayoutStatus::Pending.as_str())
        .bind(&payout.bank.bank_name)
        .bind(&payout.bank.account_number)
        .bind(&payout.bank.account_name)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn list_payouts(&self, filter: PayoutFilter) -> Result<Vec<Payout>, AppError> {
        let payouts = sqlx::query_as::<_, Payout>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts \
             WHERE ($1::UUID IS NULL OR organizer_id = $1) \
             AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at DESC"
        ))
        .bind(filter.organizer_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(payouts)
    }

    async fn transition_payouts(
        &self,
        ids: &[PayoutId],
        from: PayoutStatus,
        to: PayoutStatus,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Vec<Payout>, AppError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_as::<_, (PayoutId, String)>(
            "SELECT id, status FROM payouts WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&uuids)
        .fetch_all(&mut *tx)
        .await?;
        let current: HashMap<PayoutId, String> = locked.into_iter().collect();

        for id in ids {
            let status = current
                .get(id)
                .ok_or_else(|| AppError::not_found(format!("payout {id}")))?;
            let status = PayoutStatus::try_from(status.clone())
                .map_err(|e| AppError::PersistenceError(e.to_string()))?;
            if status != from {
                return Err(AppError::InvalidRequest(not_in_state_message(
                    *id, status, from,
                )));
            }
        }

        let updated = sqlx::query_as::<_, Payout>(&format!(
            "UPDATE payouts SET status = $2, note = $3, processed_at = $4 \
             WHERE id = ANY($1) RETURNING {PAYOUT_COLUMNS}"
        ))
        .bind(&uuids)
        .bind(to.as_str())
        .bind(&note)
        .bind(at)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut by_id: HashMap<PayoutId, Payout> =
            updated.into_iter().map(|p| (p.id, p)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("jazz"), "%jazz%");
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn non_unique_errors_pass_through() {
        let err = conflict_on_unique(sqlx::Error::RowNotFound, "dup".into());
        assert!(matches!(err, AppError::PersistenceError(_)));
    }
}
