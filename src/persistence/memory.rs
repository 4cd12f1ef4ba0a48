//! In-memory repository.
//!
//! All tables live in one [`MemoryState`] behind a single
//! [`tokio::sync::RwLock`]. Every mutating method holds the write lock for
//! its whole duration and validates before it mutates, which gives the same
//! all-or-nothing behaviour as the PostgreSQL transactions.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::models::{
    BankAccount, Event, EventChanges, EventFilter, NewEvent, NewPayment, NewPayout,
    NewTicketType, NewUser, OrganizerBalance, Payment, Payout, PayoutFilter, Ticket, TicketType,
    User, VerificationToken,
};
use super::{NewTicket, Repository, not_in_state_message, sold_out_message};
use crate::domain::{
    EventId, EventStatus, PaymentId, PaymentStatus, PayoutId, PayoutStatus, Role, TicketId,
    TicketStatus, TicketTypeId, TokenPurpose, UserId,
};
use crate::error::AppError;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    tokens: Vec<VerificationToken>,
    events: HashMap<EventId, Event>,
    ticket_types: Vec<TicketType>,
    favorites: Vec<(UserId, EventId, DateTime<Utc>)>,
    payments: HashMap<String, Payment>,
    tickets: Vec<Ticket>,
    payouts: HashMap<PayoutId, Payout>,
}

impl MemoryState {
    fn user_mut(&mut self, id: UserId) -> Result<&mut User, AppError> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("user {id}")))
    }

    fn event_mut(&mut self, id: EventId) -> Result<&mut Event, AppError> {
        self.events
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("event {id}")))
    }

    /// Checks capacity for every requested ticket, then increments sold
    /// counts and inserts the tickets. Nothing changes if any check fails.
    fn issue_tickets(
        &mut self,
        event_id: EventId,
        user_id: UserId,
        payment_id: Option<PaymentId>,
        tickets: Vec<NewTicket>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, AppError> {
        let event = self
            .events
            .get(&event_id)
            .ok_or_else(|| AppError::not_found(format!("event {event_id}")))?;
        if event.status == EventStatus::Cancelled {
            return Err(AppError::Conflict(format!("event {event_id} is cancelled")));
        }

        let mut wanted: HashMap<TicketTypeId, i32> = HashMap::new();
        for ticket in &tickets {
            *wanted.entry(ticket.ticket_type_id).or_default() += 1;
        }

        for (tt_id, count) in &wanted {
            let tt = self
                .ticket_types
                .iter()
                .find(|tt| tt.id == *tt_id && tt.event_id == event_id)
                .ok_or_else(|| AppError::not_found(format!("ticket type {tt_id}")))?;
            if tt.sold + count > tt.quantity {
                return Err(AppError::Conflict(sold_out_message(&tt.name)));
            }
        }

        for tt in &mut self.ticket_types {
            if let Some(count) = wanted.get(&tt.id) {
                tt.sold += count;
            }
        }

        let issued: Vec<Ticket> = tickets
            .into_iter()
            .map(|t| Ticket {
                id: TicketId::new(),
                code: t.code,
                ticket_type_id: t.ticket_type_id,
                event_id,
                user_id,
                payment_id,
                status: TicketStatus::Valid,
                created_at: now,
                checked_in_at: None,
            })
            .collect();
        self.tickets.extend(issued.iter().cloned());
        Ok(issued)
    }

    fn balance(&self, organizer_id: UserId) -> OrganizerBalance {
        let total_earned = self
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Success)
            .filter(|p| {
                self.events
                    .get(&p.event_id)
                    .is_some_and(|e| e.organizer_id == organizer_id)
            })
            .map(|p| p.organizer_amount)
            .sum();

        let mut balance = OrganizerBalance {
            total_earned,
            ..OrganizerBalance::default()
        };
        for payout in self.payouts.values() {
            if payout.organizer_id != organizer_id {
                continue;
            }
            match payout.status {
                PayoutStatus::Pending => balance.pending += payout.amount,
                PayoutStatus::Approved => balance.withdrawn += payout.amount,
                PayoutStatus::Rejected => {}
            }
        }
        balance
    }
}

/// Repository backed by process memory. Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        let now = Utc::now();
        let record = User {
            id: UserId::new(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            email_verified_at: None,
            bank_name: None,
            account_number: None,
            account_name: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user_name(&self, id: UserId, name: &str) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        user.name = name.to_string();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn mark_email_verified(&self, id: UserId, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        if user.email_verified_at.is_none() {
            user.email_verified_at = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_organizer_profile(
        &self,
        id: UserId,
        role: Role,
        bank: &BankAccount,
    ) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        let user = state.user_mut(id)?;
        user.role = role;
        user.bank_name = Some(bank.bank_name.clone());
        user.account_number = Some(bank.account_number.clone());
        user.account_name = Some(bank.account_name.clone());
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn replace_token(&self, token: VerificationToken) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        state
            .tokens
            .retain(|t| !(t.identifier == token.identifier && t.purpose == token.purpose));
        state.tokens.push(token);
        Ok(())
    }

    async fn take_token(
        &self,
        purpose: TokenPurpose,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, AppError> {
        let mut state = self.state.write().await;
        let position = state
            .tokens
            .iter()
            .position(|t| t.purpose == purpose && t.token_hash == token_hash);
        Ok(position.map(|i| state.tokens.swap_remove(i)))
    }

    async fn create_event(
        &self,
        event: NewEvent,
        ticket_types: Vec<NewTicketType>,
    ) -> Result<(Event, Vec<TicketType>), AppError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let record = Event {
            id: EventId::new(),
            organizer_id: event.organizer_id,
            title: event.title,
            description: event.description,
            venue: event.venue,
            category: event.category,
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            is_free: event.is_free,
            status: EventStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        let types: Vec<TicketType> = ticket_types
            .into_iter()
            .map(|tt| TicketType {
                id: TicketTypeId::new(),
                event_id: record.id,
                name: tt.name,
                price: tt.price,
                quantity: tt.quantity,
                sold: 0,
            })
            .collect();
        state.events.insert(record.id, record.clone());
        state.ticket_types.extend(types.iter().cloned());
        Ok((record, types))
    }

    async fn find_event(&self, id: EventId) -> Result<Option<Event>, AppError> {
        Ok(self.state.read().await.events.get(&id).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<(Vec<Event>, u64), AppError> {
        let state = self.state.read().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let mut matched: Vec<&Event> = state
            .events
            .values()
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .filter(|e| filter.organizer_id.is_none_or(|o| e.organizer_id == o))
            .filter(|e| {
                filter
                    .category
                    .as_deref()
                    .is_none_or(|c| e.category.as_deref() == Some(c))
            })
            .filter(|e| {
                needle
                    .as_deref()
                    .is_none_or(|n| e.title.to_lowercase().contains(n))
            })
            .collect();
        matched.sort_by_key(|e| (e.starts_at, e.created_at));

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.per_page as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn update_event(&self, id: EventId, changes: EventChanges) -> Result<Event, AppError> {
        let mut state = self.state.write().await;
        let event = state.event_mut(id)?;
        if let Some(title) = changes.title {
            event.title = title;
        }
        if let Some(description) = changes.description {
            event.description = Some(description);
        }
        if let Some(venue) = changes.venue {
            event.venue = venue;
        }
        if let Some(category) = changes.category {
            event.category = Some(category);
        }
        if let Some(starts_at) = changes.starts_at {
            event.starts_at = starts_at;
        }
        if let Some(ends_at) = changes.ends_at {
            event.ends_at = Some(ends_at);
        }
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn set_event_status(
        &self,
        id: EventId,
        status: EventStatus,
    ) -> Result<Event, AppError> {
        let mut state = self.state.write().await;
        let event = state.event_mut(id)?;
        event.status = status;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn cancel_event(&self, id: EventId) -> Result<(Event, u64), AppError> {
        let mut state = self.state.write().await;
        let event = state.event_mut(id)?;
        event.status = EventStatus::Cancelled;
        event.updated_at = Utc::now();
        let event = event.clone();

        let mut cancelled = 0;
        for ticket in state
            .tickets
            .iter_mut()
            .filter(|t| t.event_id == id && t.status == TicketStatus::Valid)
        {
            ticket.status = TicketStatus::Cancelled;
            cancelled += 1;
        }
        Ok((event, cancelled))
    }

    async fn delete_event(&self, id: EventId) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.events.contains_key(&id) {
            return Err(AppError::not_found(format!("event {id}")));
        }
        if state
            .ticket_types
            .iter()
            .any(|tt| tt.event_id == id && tt.sold > 0)
        {
            return Err(AppError::Conflict(
                "events with sold tickets cannot be deleted".into(),
            ));
        }
        if state
            .payments
            .values()
            .any(|p| p.event_id == id && p.status.is_live())
        {
            return Err(AppError::Conflict(format!(
                "event {id} has payments in progress"
            )));
        }
        state.events.remove(&id);
        state.ticket_types.retain(|tt| tt.event_id != id);
        state.favorites.retain(|(_, event_id, _)| *event_id != id);
        state.payments.retain(|_, p| p.event_id != id);
        Ok(())
    }

    async fn add_ticket_type(
        &self,
        event_id: EventId,
        ticket_type: NewTicketType,
    ) -> Result<TicketType, AppError> {
        let mut state = self.state.write().await;
        if !state.events.contains_key(&event_id) {
            return Err(AppError::not_found(format!("event {event_id}")));
        }
        let record = TicketType {
            id: TicketTypeId::new(),
            event_id,
            name: ticket_type.name,
            price: ticket_type.price,
            quantity: ticket_type.quantity,
            sold: 0,
        };
        state.ticket_types.push(record.clone());
        Ok(record)
    }

    async fn list_ticket_types(&self, event_id: EventId) -> Result<Vec<TicketType>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .ticket_types
            .iter()
            .filter(|tt| tt.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn find_ticket_type(&self, id: TicketTypeId) -> Result<Option<TicketType>, AppError> {
        let state = self.state.read().await;
        Ok(state.ticket_types.iter().find(|tt| tt.id == id).cloned())
    }

    async fn delete_ticket_type(&self, id: TicketTypeId) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let tt = state
            .ticket_types
            .iter()
            .find(|tt| tt.id == id)
            .ok_or_else(|| AppError::not_found(format!("ticket type {id}")))?;
        if tt.sold > 0 {
            return Err(AppError::Conflict(format!(
                "ticket type {} already has sales",
                tt.name
            )));
        }
        if state.payments.values().any(|p| {
            p.status.is_live() && p.items.iter().any(|line| line.ticket_type_id == id)
        }) {
            return Err(AppError::Conflict(format!(
                "ticket type {} has payments in progress",
                tt.name
            )));
        }
        state.ticket_types.retain(|tt| tt.id != id);
        Ok(())
    }

    async fn add_favorite(&self, user_id: UserId, event_id: EventId) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        if !state.events.contains_key(&event_id) {
            return Err(AppError::not_found(format!("event {event_id}")));
        }
        if state
            .favorites
            .iter()
            .any(|(u, e, _)| *u == user_id && *e == event_id)
        {
            return Ok(false);
        }
        state.favorites.push((user_id, event_id, Utc::now()));
        Ok(true)
    }

    async fn remove_favorite(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let before = state.favorites.len();
        state
            .favorites
            .retain(|(u, e, _)| !(*u == user_id && *e == event_id));
        Ok(state.favorites.len() != before)
    }

    async fn list_favorite_events(&self, user_id: UserId) -> Result<Vec<Event>, AppError> {
        let state = self.state.read().await;
        let mut favorites: Vec<_> = state
            .favorites
            .iter()
            .filter(|(u, _, _)| *u == user_id)
            .collect();
        favorites.sort_by(|a, b| b.2.cmp(&a.2));
        Ok(favorites
            .into_iter()
            .filter_map(|(_, event_id, _)| state.events.get(event_id).cloned())
            .collect())
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<Payment, AppError> {
        let mut state = self.state.write().await;
        if state.payments.contains_key(&payment.reference) {
            return Err(AppError::Conflict(format!(
                "payment reference {} already exists",
                payment.reference
            )));
        }
        let b = payment.breakdown;
        let record = Payment {
            id: PaymentId::new(),
            reference: payment.reference,
            user_id: payment.user_id,
            event_id: payment.event_id,
            subtotal: b.subtotal,
            processor_fee: b.processor_fee,
            total_amount: b.total_amount,
            organizer_amount: b.organizer_amount,
            platform_amount: b.platform_amount,
            status: PaymentStatus::Pending,
            items: payment.items,
            created_at: Utc::now(),
            paid_at: None,
        };
        state
            .payments
            .insert(record.reference.clone(), record.clone());
        Ok(record)
    }

    async fn find_payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, AppError> {
        Ok(self.state.read().await.payments.get(reference).cloned())
    }

    async fn settle_payment(
        &self,
        reference: &str,
        tickets: Vec<NewTicket>,
        paid_at: DateTime<Utc>,
    ) -> Result<(Payment, Vec<Ticket>), AppError> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get(reference)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("payment {reference}")))?;
        if payment.status != PaymentStatus::Pending {
            return Err(AppError::Conflict(format!(
                "payment {reference} is already {}",
                payment.status
            )));
        }

        let issued = state.issue_tickets(
            payment.event_id,
            payment.user_id,
            Some(payment.id),
            tickets,
            paid_at,
        )?;

        let stored = state
            .payments
            .get_mut(reference)
            .ok_or_else(|| AppError::not_found(format!("payment {reference}")))?;
        stored.status = PaymentStatus::Success;
        stored.paid_at = Some(paid_at);
        Ok((stored.clone(), issued))
    }

    async fn fail_payment(&self, reference: &str) -> Result<Payment, AppError> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(reference)
            .ok_or_else(|| AppError::not_found(format!("payment {reference}")))?;
        if payment.status == PaymentStatus::Pending {
            payment.status = PaymentStatus::Failed;
        }
        Ok(payment.clone())
    }

    async fn issue_free_tickets(
        &self,
        event_id: EventId,
        user_id: UserId,
        tickets: Vec<NewTicket>,
    ) -> Result<Vec<Ticket>, AppError> {
        let mut state = self.state.write().await;
        state.issue_tickets(event_id, user_id, None, tickets, Utc::now())
    }

    async fn list_payment_tickets(&self, payment_id: PaymentId) -> Result<Vec<Ticket>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .tickets
            .iter()
            .filter(|t| t.payment_id == Some(payment_id))
            .cloned()
            .collect())
    }

    async fn list_user_tickets(&self, user_id: UserId) -> Result<Vec<Ticket>, AppError> {
        let state = self.state.read().await;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn find_ticket(&self, id: TicketId) -> Result<Option<Ticket>, AppError> {
        let state = self.state.read().await;
        Ok(state.tickets.iter().find(|t| t.id == id).cloned())
    }

    async fn check_in_ticket(&self, id: TicketId, at: DateTime<Utc>) -> Result<Ticket, AppError> {
        let mut state = self.state.write().await;
        let ticket = state
            .tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| AppError::not_found(format!("ticket {id}")))?;
        if ticket.status != TicketStatus::Valid {
            return Err(AppError::Conflict(format!(
                "ticket {id} is {}",
                ticket.status
            )));
        }
        ticket.status = TicketStatus::Used;
        ticket.checked_in_at = Some(at);
        Ok(ticket.clone())
    }

    async fn organizer_balance(
        &self,
        organizer_id: UserId,
    ) -> Result<OrganizerBalance, AppError> {
        Ok(self.state.read().await.balance(organizer_id))
    }

    async fn create_payout(&self, payout: NewPayout) -> Result<Payout, AppError> {
        let mut state = self.state.write().await;
        let available = state.balance(payout.organizer_id).available();
        if payout.amount > available {
            return Err(AppError::InvalidRequest(format!(
                "requested {} exceeds available balance {available}",
                payout.amount
            )));
        }
        let record = Payout {
            id: PayoutId::new(),
            organizer_id: payout.organizer_id,
            amount: payout.amount,
            status: PayoutStatus::Pending,
            note: None,
            bank_name: payout.bank.bank_name,
            account_number: payout.bank.account_number,
            account_name: payout.bank.account_name,
            created_at: Utc::now(),
            processed_at: None,
        };
        state.payouts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_payouts(&self, filter: PayoutFilter) -> Result<Vec<Payout>, AppError> {
        let state = self.state.read().await;
        let mut payouts: Vec<Payout> = state
            .payouts
            .values()
            .filter(|p| filter.organizer_id.is_none_or(|o| p.organizer_id == o))
            .filter(|p| filter.status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        payouts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
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
        let mut state = self.state.write().await;

        for id in ids {
            let payout = state
                .payouts
                .get(id)
                .ok_or_else(|| AppError::not_found(format!("payout {id}")))?;
            if payout.status != from {
                return Err(AppError::InvalidRequest(not_in_state_message(
                    *id,
                    payout.status,
                    from,
                )));
            }
        }

        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(payout) = state.payouts.get_mut(id) {
                payout.status = to;
                payout.note.clone_from(&note);
                payout.processed_at = Some(at);
                updated.push(payout.clone());
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{FeeSchedule, OrderLine};

    async fn seed_organizer(repo: &MemoryRepository) -> User {
        let Ok(user) = repo
            .create_user(NewUser {
                email: "org@example.com".into(),
                name: "Org".into(),
                password_hash: "hash".into(),
                role: Role::Organizer,
            })
            .await
        else {
            panic!("user insert failed");
        };
        user
    }

    async fn seed_event(repo: &MemoryRepository, organizer: UserId, quantity: i32) -> TicketType {
        let Ok((_, types)) = repo
            .create_event(
                NewEvent {
                    organizer_id: organizer,
                    title: "Afrobeats Night".into(),
                    description: None,
                    venue: "Eko Hotel".into(),
                    category: Some("music".into()),
                    starts_at: Utc::now(),
                    ends_at: None,
                    is_free: false,
                },
                vec![NewTicketType {
                    name: "Regular".into(),
                    price: 500_000,
                    quantity,
                }],
            )
            .await
        else {
            panic!("event insert failed");
        };
        let Some(tt) = types.into_iter().next() else {
            panic!("ticket type missing");
        };
        tt
    }

    async fn seed_payment(repo: &MemoryRepository, tt: &TicketType, buyer: UserId) -> Payment {
        let line = OrderLine {
            ticket_type_id: tt.id,
            name: tt.name.clone(),
            unit_price: tt.price,
            quantity: 1,
        };
        let Ok(breakdown) = FeeSchedule::STANDARD.breakdown(tt.price) else {
            panic!("breakdown failed");
        };
        let Ok(payment) = repo
            .create_payment(NewPayment {
                reference: format!("ref-{}", uuid::Uuid::new_v4()),
                user_id: buyer,
                event_id: tt.event_id,
                breakdown,
                items: vec![line],
            })
            .await
        else {
            panic!("payment insert failed");
        };
        payment
    }

    fn ticket(tt: &TicketType, code: &str) -> NewTicket {
        NewTicket {
            code: code.into(),
            ticket_type_id: tt.id,
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let repo = MemoryRepository::new();
        seed_organizer(&repo).await;
        let result = repo
            .create_user(NewUser {
                email: "org@example.com".into(),
                name: "Other".into(),
                password_hash: "hash".into(),
                role: Role::User,
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn settle_rejects_oversell_without_side_effects() {
        let repo = MemoryRepository::new();
        let org = seed_organizer(&repo).await;
        let tt = seed_event(&repo, org.id, 1).await;
        let payment = seed_payment(&repo, &tt, org.id).await;

        let result = repo
            .settle_payment(
                &payment.reference,
                vec![ticket(&tt, "A"), ticket(&tt, "B")],
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let Ok(Some(after)) = repo.find_ticket_type(tt.id).await else {
            panic!("ticket type missing");
        };
        assert_eq!(after.sold, 0);
        let Ok(Some(stored)) = repo.find_payment_by_reference(&payment.reference).await else {
            panic!("payment missing");
        };
        assert_eq!(stored.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn settle_twice_conflicts() {
        let repo = MemoryRepository::new();
        let org = seed_organizer(&repo).await;
        let tt = seed_event(&repo, org.id, 5).await;
        let payment = seed_payment(&repo, &tt, org.id).await;

        let first = repo
            .settle_payment(&payment.reference, vec![ticket(&tt, "A")], Utc::now())
            .await;
        assert!(first.is_ok());
        let second = repo
            .settle_payment(&payment.reference, vec![ticket(&tt, "B")], Utc::now())
            .await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn live_payments_block_deletes() {
        let repo = MemoryRepository::new();
        let org = seed_organizer(&repo).await;
        let tt = seed_event(&repo, org.id, 5).await;
        let payment = seed_payment(&repo, &tt, org.id).await;

        assert!(matches!(
            repo.delete_ticket_type(tt.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            repo.delete_event(tt.event_id).await,
            Err(AppError::Conflict(_))
        ));

        assert!(repo.fail_payment(&payment.reference).await.is_ok());
        assert!(repo.delete_event(tt.event_id).await.is_ok());
        let Ok(gone) = repo.find_payment_by_reference(&payment.reference).await else {
            panic!("lookup failed");
        };
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn cancel_event_voids_valid_tickets_only() {
        let repo = MemoryRepository::new();
        let org = seed_organizer(&repo).await;
        let tt = seed_event(&repo, org.id, 5).await;
        let Ok(issued) = repo
            .issue_free_tickets(tt.event_id, org.id, vec![ticket(&tt, "A"), ticket(&tt, "B")])
            .await
        else {
            panic!("issue failed");
        };
        let Some(first) = issued.first() else {
            panic!("no tickets");
        };
        assert!(repo.check_in_ticket(first.id, Utc::now()).await.is_ok());

        let Ok((event, cancelled)) = repo.cancel_event(tt.event_id).await else {
            panic!("cancel failed");
        };
        assert_eq!(event.status, EventStatus::Cancelled);
        assert_eq!(cancelled, 1);

        let Ok(tickets) = repo.list_user_tickets(org.id).await else {
            panic!("listing failed");
        };
        assert_eq!(
            tickets.iter().filter(|t| t.status == TicketStatus::Used).count(),
            1
        );
        assert_eq!(
            tickets
                .iter()
                .filter(|t| t.status == TicketStatus::Cancelled)
                .count(),
            1
        );
        assert!(matches!(
            repo.issue_free_tickets(tt.event_id, org.id, vec![ticket(&tt, "C")])
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn favorites_are_unique_per_pair() {
        let repo = MemoryRepository::new();
        let org = seed_organizer(&repo).await;
        let tt = seed_event(&repo, org.id, 5).await;

        assert!(matches!(repo.add_favorite(org.id, tt.event_id).await, Ok(true)));
        assert!(matches!(repo.add_favorite(org.id, tt.event_id).await, Ok(false)));
        let Ok(events) = repo.list_favorite_events(org.id).await else {
            panic!("listing failed");
        };
        assert_eq!(events.len(), 1);
        assert!(matches!(repo.remove_favorite(org.id, tt.event_id).await, Ok(true)));
        assert!(matches!(repo.remove_favorite(org.id, tt.event_id).await, Ok(false)));
    }

    #[tokio::test]
    async fn payout_cannot_exceed_available_balance() {
        let repo = MemoryRepository::new();
        let org = seed_organizer(&repo).await;
        let tt = seed_event(&repo, org.id, 5).await;
        let payment = seed_payment(&repo, &tt, org.id).await;
        let settled = repo
            .settle_payment(&payment.reference, vec![ticket(&tt, "A")], Utc::now())
            .await;
        assert!(settled.is_ok());

        let Ok(balance) = repo.organizer_balance(org.id).await else {
            panic!("balance failed");
        };
        assert_eq!(balance.total_earned, payment.organizer_amount);

        let bank = BankAccount {
            bank_name: "GTBank".into(),
            account_number: "0123456789".into(),
            account_name: "Org".into(),
        };
        let too_much = repo
            .create_payout(NewPayout {
                organizer_id: org.id,
                amount: balance.available() + 1,
                bank: bank.clone(),
            })
            .await;
        assert!(matches!(too_much, Err(AppError::InvalidRequest(_))));

        let exact = repo
            .create_payout(NewPayout {
                organizer_id: org.id,
                amount: balance.available(),
                bank,
            })
            .await;
        assert!(exact.is_ok());
        let Ok(after) = repo.organizer_balance(org.id).await else {
            panic!("balance failed");
        };
        assert_eq!(after.available(), 0);
    }

    #[tokio::test]
    async fn mixed_batch_transitions_nothing() {
        let repo = MemoryRepository::new();
        let org = seed_organizer(&repo).await;
        let bank = BankAccount {
            bank_name: "GTBank".into(),
            account_number: "0123456789".into(),
            account_name: "Org".into(),
        };
        let mut ids = Vec::new();
        {
            // Payouts inserted directly; balance rules are covered elsewhere.
            let mut state = repo.state.write().await;
            for status in [
                PayoutStatus::Pending,
                PayoutStatus::Approved,
                PayoutStatus::Pending,
            ] {
                let payout = Payout {
                    id: PayoutId::new(),
                    organizer_id: org.id,
                    amount: 1_000,
                    status,
                    note: None,
                    bank_name: bank.bank_name.clone(),
                    account_number: bank.account_number.clone(),
                    account_name: bank.account_name.clone(),
                    created_at: Utc::now(),
                    processed_at: None,
                };
                ids.push(payout.id);
                state.payouts.insert(payout.id, payout);
            }
        }

        let result = repo
            .transition_payouts(
                &ids,
                PayoutStatus::Pending,
                PayoutStatus::Approved,
                None,
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));

        let Ok(pending) = repo
            .list_payouts(PayoutFilter {
                status: Some(PayoutStatus::Pending),
                ..PayoutFilter::default()
            })
            .await
        else {
            panic!("listing failed");
        };
        assert_eq!(pending.len(), 2);
    }
}
