//! Checkout, settlement and tickets.
//!
//! Prices always come from storage: the client names ticket types and
//! quantities, the server prices them, computes the [`PaymentBreakdown`],
//! and only then compares the client's total with the tolerance guard.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;

use crate::domain::order::{self, MAX_QUANTITY_PER_LINE};
use crate::domain::{
    EventId, EventStatus, FeeSchedule, FieldErrors, OrderLine, PaymentBreakdown, PaymentStatus,
    TicketId, TicketTypeId,
};
use crate::error::AppError;
use crate::mail::templates::{self, TicketLine};
use crate::mail::{Mailer, send_best_effort};
use crate::payment::{InitializeRequest, PaymentGateway, TransactionStatus};
use crate::persistence::models::{Event, NewPayment, Payment, Ticket};
use crate::persistence::{NewTicket, Repository};
use crate::service::AuthUser;

const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 10;

/// One requested line: a ticket type and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItem {
    /// Ticket type.
    pub ticket_type_id: TicketTypeId,
    /// Number of tickets, `1..=10`.
    pub quantity: u32,
}

/// Priced selection.
#[derive(Debug, Clone)]
pub struct Quote {
    /// Event the tickets belong to.
    pub event: Event,
    /// Priced lines.
    pub lines: Vec<OrderLine>,
    /// Fee breakdown of the selection.
    pub breakdown: PaymentBreakdown,
}

/// Result of [`CheckoutService::checkout`].
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// A paid order is waiting for the buyer to pay at the gateway.
    AwaitingPayment {
        /// Payment reference.
        reference: String,
        /// Gateway page for the buyer.
        authorization_url: String,
        /// Fee breakdown.
        breakdown: PaymentBreakdown,
    },
    /// A free order was fulfilled immediately.
    Completed {
        /// Fee breakdown (all zero).
        breakdown: PaymentBreakdown,
        /// Issued tickets.
        tickets: Vec<Ticket>,
    },
}

/// A settled payment with its tickets.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// The payment, now `success`.
    pub payment: Payment,
    /// Tickets issued for it.
    pub tickets: Vec<Ticket>,
}

/// Purchase flow and ticket access.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    repo: Arc<dyn Repository>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    fees: FeeSchedule,
    app_base_url: String,
}

impl CheckoutService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        repo: Arc<dyn Repository>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        fees: FeeSchedule,
        app_base_url: String,
    ) -> Self {
        Self {
            repo,
            gateway,
            mailer,
            fees,
            app_base_url,
        }
    }

    /// The fee schedule applied to every purchase.
    #[must_use]
    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Prices a selection without side effects.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`] for unknown or unpublished events,
    /// [`AppError::InvalidFields`] for malformed items,
    /// [`AppError::Conflict`] for cancelled events or insufficient capacity.
    pub async fn quote(&self, event_id: EventId, items: &[CartItem]) -> Result<Quote, AppError> {
        let event = self
            .repo
            .find_event(event_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("event {event_id}")))?;
        match event.status {
            EventStatus::Published => {}
            EventStatus::Draft => return Err(AppError::not_found(format!("event {event_id}"))),
            EventStatus::Cancelled => {
                return Err(AppError::Conflict("event is cancelled".into()));
            }
        }

        let mut errors = FieldErrors::new();
        if items.is_empty() {
            errors.add("items", "select at least one ticket");
        }
        let mut seen = HashSet::new();
        for (i, item) in items.iter().enumerate() {
            if !(1..=MAX_QUANTITY_PER_LINE).contains(&item.quantity) {
                errors.add(
                    format!("items[{i}].quantity"),
                    format!("quantity must be between 1 and {MAX_QUANTITY_PER_LINE}"),
                );
            }
            if !seen.insert(item.ticket_type_id) {
                errors.add(
                    format!("items[{i}].ticket_type_id"),
                    "ticket type listed more than once",
                );
            }
        }

        let types: HashMap<TicketTypeId, _> = self
            .repo
            .list_ticket_types(event_id)
            .await?
            .into_iter()
            .map(|tt| (tt.id, tt))
            .collect();

        let mut lines = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let Some(tt) = types.get(&item.ticket_type_id) else {
                errors.add(
                    format!("items[{i}].ticket_type_id"),
                    "ticket type does not belong to this event",
                );
                continue;
            };
            lines.push(OrderLine {
                ticket_type_id: tt.id,
                name: tt.name.clone(),
                unit_price: tt.price,
                quantity: item.quantity,
            });
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        for line in &lines {
            let remaining = types
                .get(&line.ticket_type_id)
                .map_or(0, |tt| tt.remaining());
            if i64::from(line.quantity) > i64::from(remaining) {
                return Err(AppError::Conflict(crate::persistence::sold_out_message(
                    &line.name,
                )));
            }
        }

        let subtotal = order::subtotal(&lines)
            .ok_or_else(|| AppError::InvalidRequest("order total is too large".into()))?;
        let breakdown = self.fees.breakdown(subtotal)?;
        Ok(Quote {
            event,
            lines,
            breakdown,
        })
    }

    /// Starts a purchase.
    ///
    /// `submitted_amount` is the total the client displayed to the buyer. It
    /// must match the server total within the tolerance.
    ///
    /// # Errors
    ///
    /// Everything [`CheckoutService::quote`] returns, plus
    /// [`AppError::AmountMismatch`] and [`AppError::PaymentGateway`].
    pub async fn checkout(
        &self,
        buyer: &AuthUser,
        event_id: EventId,
        items: &[CartItem],
        submitted_amount: i64,
    ) -> Result<CheckoutOutcome, AppError> {
        let quote = self.quote(event_id, items).await?;
        let breakdown = quote.breakdown;
        self.fees
            .ensure_amount_matches(breakdown.total_amount, submitted_amount)?;

        if breakdown.total_amount == 0 {
            let tickets = self
                .repo
                .issue_free_tickets(event_id, buyer.id, new_tickets(&quote.lines))
                .await?;
            tracing::info!(%event_id, buyer = %buyer.id, count = tickets.len(), "free tickets issued");
            self.send_confirmation(&buyer.email, &quote.event, "free", &tickets, &quote.lines, &breakdown)
                .await;
            return Ok(CheckoutOutcome::Completed { breakdown, tickets });
        }

        let reference = format!("TIX-{}", uuid::Uuid::new_v4().simple());
        self.repo
            .create_payment(NewPayment {
                reference: reference.clone(),
                user_id: buyer.id,
                event_id,
                breakdown,
                items: quote.lines,
            })
            .await?;

        let init = self
            .gateway
            .initialize(InitializeRequest {
                email: buyer.email.clone(),
                amount: breakdown.total_amount,
                reference: reference.clone(),
                callback_url: format!("{}/checkout/complete?reference={reference}", self.app_base_url),
            })
            .await;
        let init = match init {
            Ok(init) => init,
            Err(e) => {
                tracing::warn!(%reference, error = %e, "gateway initialization failed");
                if let Err(fail) = self.repo.fail_payment(&reference).await {
                    tracing::warn!(%reference, error = %fail, "could not mark payment failed");
                }
                return Err(e.into());
            }
        };

        tracing::info!(%reference, %event_id, total = breakdown.total_amount, "payment initialized");
        Ok(CheckoutOutcome::AwaitingPayment {
            reference,
            authorization_url: init.authorization_url,
            breakdown,
        })
    }

    /// Confirms a payment with the gateway and issues its tickets.
    /// Verifying a settled payment again returns the same tickets.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`], [`AppError::Forbidden`] for other buyers,
    /// [`AppError::AmountMismatch`] if the gateway charged a different
    /// amount, [`AppError::InvalidRequest`] if the payment failed,
    /// [`AppError::Conflict`] if still pending, or if the tickets can no longer
    /// be issued after the charge (the payment is then marked `failed`).
    pub async fn verify(&self, caller: &AuthUser, reference: &str) -> Result<Settlement, AppError> {
        let payment = self
            .repo
            .find_payment_by_reference(reference)
            .await?
            .ok_or_else(|| AppError::not_found(format!("payment {reference}")))?;
        if payment.user_id != caller.id && !caller.role.is_admin() {
            return Err(AppError::Forbidden("not your payment".into()));
        }

        match payment.status {
            PaymentStatus::Success => return self.settled(payment).await,
            PaymentStatus::Failed => {
                return Err(AppError::InvalidRequest(format!("payment {reference} failed")));
            }
            PaymentStatus::Pending => {}
        }

        let verification = self.gateway.verify(reference).await?;
        match verification.status {
            TransactionStatus::Pending => {
                return Err(AppError::Conflict(format!(
                    "payment {reference} is not complete yet"
                )));
            }
            TransactionStatus::Failed => {
                self.repo.fail_payment(reference).await?;
                tracing::info!(%reference, "payment failed at gateway");
                return Err(AppError::InvalidRequest(format!("payment {reference} failed")));
            }
            TransactionStatus::Success => {}
        }

        if let Err(mismatch) = self
            .fees
            .ensure_amount_matches(payment.total_amount, verification.amount)
        {
            self.repo.fail_payment(reference).await?;
            tracing::warn!(
                %reference,
                expected = payment.total_amount,
                charged = verification.amount,
                "gateway amount mismatch"
            );
            return Err(mismatch.into());
        }

        let result = self
            .repo
            .settle_payment(reference, new_tickets(&payment.items), Utc::now())
            .await;
        let (settled, tickets) = match result {
            Ok(done) => done,
            Err(err @ (AppError::Conflict(_) | AppError::NotFound(_))) => {
                return self.unsettled(reference, err).await;
            }
            Err(e) => return Err(e),
        };

        tracing::info!(%reference, count = tickets.len(), "payment settled");
        let buyer = self.repo.find_user(settled.user_id).await?;
        let event = self.repo.find_event(settled.event_id).await?;
        if let (Some(buyer), Some(event)) = (buyer, event) {
            self.send_confirmation(
                &buyer.email,
                &event,
                reference,
                &tickets,
                &settled.items,
                &settled.breakdown(),
            )
            .await;
        }
        Ok(Settlement {
            payment: settled,
            tickets,
        })
    }

    /// Tickets held by the caller.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn my_tickets(&self, caller: &AuthUser) -> Result<Vec<Ticket>, AppError> {
        self.repo.list_user_tickets(caller.id).await
    }

    /// A ticket, visible to its holder, the event organizer and admins.
    ///
    /// # Errors
    ///
    /// [`AppError::NotFound`], [`AppError::Forbidden`].
    pub async fn ticket(&self, caller: &AuthUser, id: TicketId) -> Result<Ticket, AppError> {
        let ticket = self.load_ticket(id).await?;
        if ticket.user_id == caller.id || self.organizes(caller, ticket.event_id).await? {
            Ok(ticket)
        } else {
            Err(AppError::Forbidden("not your ticket".into()))
        }
    }

    /// Admits a ticket holder. Only the event organizer or an admin may
    /// check tickets in.
    ///
    /// # Errors
    ///
    /// [`AppError::Forbidden`], [`AppError::Conflict`] if the ticket was
    /// already used or cancelled, or its event was cancelled.
    pub async fn check_in(&self, caller: &AuthUser, id: TicketId) -> Result<Ticket, AppError> {
        let ticket = self.load_ticket(id).await?;
        if !self.organizes(caller, ticket.event_id).await? {
            return Err(AppError::Forbidden(
                "only the event organizer can check tickets in".into(),
            ));
        }
        let event = self
            .repo
            .find_event(ticket.event_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("event {}", ticket.event_id)))?;
        if event.status == EventStatus::Cancelled {
            return Err(AppError::Conflict(format!("event {} is cancelled", event.id)));
        }
        let admitted = self.repo.check_in_ticket(id, Utc::now()).await?;
        tracing::info!(ticket_id = %id, event_id = %admitted.event_id, "ticket checked in");
        Ok(admitted)
    }

    async fn load_ticket(&self, id: TicketId) -> Result<Ticket, AppError> {
        self.repo
            .find_ticket(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("ticket {id}")))
    }

    async fn organizes(&self, caller: &AuthUser, event_id: EventId) -> Result<bool, AppError> {
        if caller.role.is_admin() {
            return Ok(true);
        }
        Ok(self
            .repo
            .find_event(event_id)
            .await?
            .is_some_and(|e| e.organizer_id == caller.id))
    }

    /// Resolves a charge that `settle_payment` refused. A concurrent verify
    /// may have settled it first; otherwise the payment is marked `failed`
    /// and flagged for refund in the logs.
    async fn unsettled(&self, reference: &str, err: AppError) -> Result<Settlement, AppError> {
        match self.repo.find_payment_by_reference(reference).await? {
            Some(p) if p.status == PaymentStatus::Success => self.settled(p).await,
            Some(p) if p.status == PaymentStatus::Pending => {
                self.repo.fail_payment(reference).await?;
                tracing::warn!(
                    %reference,
                    amount = p.total_amount,
                    error = %err,
                    "charged payment could not be settled, refund required"
                );
                Err(err)
            }
            _ => Err(err),
        }
    }

    async fn settled(&self, payment: Payment) -> Result<Settlement, AppError> {
        let tickets = self.repo.list_payment_tickets(payment.id).await?;
        Ok(Settlement { payment, tickets })
    }

    async fn send_confirmation(
        &self,
        to: &str,
        event: &Event,
        reference: &str,
        tickets: &[Ticket],
        lines: &[OrderLine],
        breakdown: &PaymentBreakdown,
    ) {
        let names: HashMap<TicketTypeId, &str> = lines
            .iter()
            .map(|l| (l.ticket_type_id, l.name.as_str()))
            .collect();
        let rows: Vec<TicketLine> = tickets
            .iter()
            .map(|t| TicketLine {
                ticket_type: names
                    .get(&t.ticket_type_id)
                    .map_or_else(String::new, |n| (*n).to_string()),
                code: t.code.clone(),
            })
            .collect();
        send_best_effort(
            self.mailer.as_ref(),
            templates::ticket_confirmation(to, &event.title, reference, &rows, breakdown),
        )
        .await;
    }
}

/// One [`NewTicket`] per purchased seat, each with a fresh code.
fn new_tickets(lines: &[OrderLine]) -> Vec<NewTicket> {
    lines
        .iter()
        .flat_map(|line| {
            (0..line.quantity).map(|_| NewTicket {
                code: ticket_code(),
                ticket_type_id: line.ticket_type_id,
            })
        })
        .collect()
}

/// `TIX-` followed by 10 characters from an unambiguous alphabet.
fn ticket_code() -> String {
    let mut bytes = [0u8; CODE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let body: String = bytes
        .iter()
        .filter_map(|b| CODE_ALPHABET.get(usize::from(b % 32)).map(|c| char::from(*c)))
        .collect();
    format!("TIX-{body}")
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Role, TicketStatus};
    use crate::service::TicketTypeInput;
    use crate::service::test_support::{Harness, event_input};

    async fn published_event(h: &Harness, is_free: bool) -> (AuthUser, EventId, TicketTypeId) {
        let org = h.organizer("org@example.com").await;
        let Ok(details) = h.events.create_event(&org, event_input(is_free)).await else {
            panic!("create failed");
        };
        assert!(h.events.publish(&org, details.event.id).await.is_ok());
        let Some(tt) = details.ticket_types.first() else {
            panic!("no ticket types");
        };
        (org, details.event.id, tt.id)
    }

    fn cart(tt: TicketTypeId, quantity: u32) -> Vec<CartItem> {
        vec![CartItem {
            ticket_type_id: tt,
            quantity,
        }]
    }

    #[test]
    fn ticket_codes_are_well_formed() {
        let code = ticket_code();
        assert_eq!(code.len(), 4 + CODE_LEN);
        assert!(code.starts_with("TIX-"));
        assert!(code.chars().skip(4).all(|c| CODE_ALPHABET.contains(&(c as u8))));
        assert_ne!(ticket_code(), code);
    }

    #[tokio::test]
    async fn quote_prices_from_storage() {
        let h = Harness::new();
        let (_, event_id, tt) = published_event(&h, false).await;
        let Ok(quote) = h.checkout.quote(event_id, &cart(tt, 2)).await else {
            panic!("quote failed");
        };
        // 2 × 500 000 = 1 000 000: 15 000 + 10 000 surcharge.
        assert_eq!(quote.breakdown.subtotal, 1_000_000);
        assert_eq!(quote.breakdown.processor_fee, 25_000);
        assert_eq!(quote.breakdown.total_amount, 1_025_000);
        assert_eq!(quote.breakdown.platform_amount, 70_000);
        assert_eq!(quote.breakdown.organizer_amount, 930_000);
    }

    #[tokio::test]
    async fn quote_rejects_bad_items() {
        let h = Harness::new();
        let (_, event_id, tt) = published_event(&h, false).await;
        let items = vec![
            CartItem {
                ticket_type_id: tt,
                quantity: 11,
            },
            CartItem {
                ticket_type_id: TicketTypeId::new(),
                quantity: 1,
            },
        ];
        let Err(AppError::InvalidFields(fields)) = h.checkout.quote(event_id, &items).await else {
            panic!("expected field errors");
        };
        assert!(fields.get("items[0].quantity").is_some());
        assert!(fields.get("items[1].ticket_type_id").is_some());
        assert!(matches!(
            h.checkout.quote(event_id, &[]).await,
            Err(AppError::InvalidFields(_))
        ));
    }

    #[tokio::test]
    async fn checkout_rejects_amount_outside_tolerance() {
        let h = Harness::new();
        let (_, event_id, tt) = published_event(&h, false).await;
        let buyer = h.user("fan@example.com", Role::User).await;

        // Server total for one ticket: 500 000 + 17 500 = 517 500.
        let off = h.checkout.checkout(&buyer, event_id, &cart(tt, 1), 517_399).await;
        let Err(AppError::AmountMismatch {
            expected,
            submitted,
        }) = off
        else {
            panic!("expected amount mismatch");
        };
        assert_eq!(expected, 517_500);
        assert_eq!(submitted, 517_399);

        let close = h.checkout.checkout(&buyer, event_id, &cart(tt, 1), 517_400).await;
        assert!(matches!(close, Ok(CheckoutOutcome::AwaitingPayment { .. })));
    }

    #[tokio::test]
    async fn paid_purchase_settles_once() {
        let h = Harness::new();
        let (org, event_id, tt) = published_event(&h, false).await;
        let buyer = h.user("fan@example.com", Role::User).await;

        let Ok(CheckoutOutcome::AwaitingPayment { reference, .. }) =
            h.checkout.checkout(&buyer, event_id, &cart(tt, 2), 1_025_000).await
        else {
            panic!("checkout failed");
        };

        let stranger = h.user("other@example.com", Role::User).await;
        assert!(matches!(
            h.checkout.verify(&stranger, &reference).await,
            Err(AppError::Forbidden(_))
        ));

        let Ok(first) = h.checkout.verify(&buyer, &reference).await else {
            panic!("verify failed");
        };
        assert_eq!(first.payment.status, PaymentStatus::Success);
        assert_eq!(first.tickets.len(), 2);

        let Ok(again) = h.checkout.verify(&buyer, &reference).await else {
            panic!("second verify failed");
        };
        assert_eq!(again.tickets.len(), 2);

        let Ok(Some(stored)) = h.repo.find_ticket_type(tt).await else {
            panic!("ticket type missing");
        };
        assert_eq!(stored.sold, 2);
        assert_eq!(h.mailer.sent_to("fan@example.com").await.len(), 1);

        let Ok(balance) = h.repo.organizer_balance(org.id).await else {
            panic!("balance failed");
        };
        assert_eq!(balance.total_earned, 930_000);
    }

    #[tokio::test]
    async fn gateway_amount_mismatch_fails_payment() {
        let h = Harness::new();
        let (_, event_id, tt) = published_event(&h, false).await;
        let buyer = h.user("fan@example.com", Role::User).await;
        let Ok(CheckoutOutcome::AwaitingPayment { reference, .. }) =
            h.checkout.checkout(&buyer, event_id, &cart(tt, 1), 517_500).await
        else {
            panic!("checkout failed");
        };
        h.gateway
            .set_outcome(&reference, TransactionStatus::Success, 400_000)
            .await;

        assert!(matches!(
            h.checkout.verify(&buyer, &reference).await,
            Err(AppError::AmountMismatch { .. })
        ));
        let Ok(Some(payment)) = h.repo.find_payment_by_reference(&reference).await else {
            panic!("payment missing");
        };
        assert_eq!(payment.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn free_checkout_issues_tickets_immediately() {
        let h = Harness::new();
        let (_, event_id, tt) = published_event(&h, true).await;
        let buyer = h.user("fan@example.com", Role::User).await;
        let Ok(CheckoutOutcome::Completed { breakdown, tickets }) =
            h.checkout.checkout(&buyer, event_id, &cart(tt, 3), 0).await
        else {
            panic!("free checkout failed");
        };
        assert_eq!(breakdown.total_amount, 0);
        assert_eq!(tickets.len(), 3);
        assert!(tickets.iter().all(|t| t.payment_id.is_none()));
    }

    #[tokio::test]
    async fn check_in_is_single_use_and_organizer_only() {
        let h = Harness::new();
        let (org, event_id, tt) = published_event(&h, true).await;
        let buyer = h.user("fan@example.com", Role::User).await;
        let Ok(CheckoutOutcome::Completed { tickets, .. }) =
            h.checkout.checkout(&buyer, event_id, &cart(tt, 1), 0).await
        else {
            panic!("free checkout failed");
        };
        let Some(ticket) = tickets.first() else {
            panic!("no ticket");
        };

        assert!(h.checkout.ticket(&buyer, ticket.id).await.is_ok());
        assert!(matches!(
            h.checkout.check_in(&buyer, ticket.id).await,
            Err(AppError::Forbidden(_))
        ));
        let Ok(used) = h.checkout.check_in(&org, ticket.id).await else {
            panic!("check-in failed");
        };
        assert!(used.checked_in_at.is_some());
        assert!(matches!(
            h.checkout.check_in(&org, ticket.id).await,
            Err(AppError::Conflict(_))
        ));
    }
    #[tokio::test]
    async fn cancelled_event_voids_tickets_and_refuses_entry() {
        let h = Harness::new();
        let (org, event_id, tt) = published_event(&h, true).await;
        let buyer = h.user("fan@example.com", Role::User).await;
        let Ok(CheckoutOutcome::Completed { tickets, .. }) =
            h.checkout.checkout(&buyer, event_id, &cart(tt, 1), 0).await
        else {
            panic!("free checkout failed");
        };
        let Some(ticket) = tickets.first() else {
            panic!("no ticket");
        };

        assert!(h.events.cancel(&org, event_id).await.is_ok());
        let Ok(voided) = h.checkout.ticket(&buyer, ticket.id).await else {
            panic!("ticket lookup failed");
        };
        assert_eq!(voided.status, TicketStatus::Cancelled);
        assert!(matches!(
            h.checkout.check_in(&org, ticket.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn tiers_with_payments_in_flight_cannot_be_deleted() {
        let h = Harness::new();
        let (org, event_id, tt) = published_event(&h, false).await;
        let buyer = h.user("fan@example.com", Role::User).await;
        let Ok(CheckoutOutcome::AwaitingPayment { reference, .. }) =
            h.checkout.checkout(&buyer, event_id, &cart(tt, 2), 1_025_000).await
        else {
            panic!("checkout failed");
        };

        assert!(matches!(
            h.events.delete_ticket_type(&org, tt).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            h.events.delete_event(&org, event_id).await,
            Err(AppError::Conflict(_))
        ));

        let Ok(settled) = h.checkout.verify(&buyer, &reference).await else {
            panic!("verify failed");
        };
        assert_eq!(settled.payment.status, PaymentStatus::Success);
        assert_eq!(settled.tickets.len(), 2);
    }

    #[tokio::test]
    async fn oversold_charge_is_marked_failed() {
        let h = Harness::new();
        let (org, event_id, _) = published_event(&h, false).await;
        let last_seat = TicketTypeInput {
            name: "Front Row".into(),
            price: 500_000,
            quantity: 1,
        };
        let Ok(tt) = h.events.add_ticket_type(&org, event_id, last_seat).await else {
            panic!("add failed");
        };
        let early = h.user("early@example.com", Role::User).await;
        let late = h.user("late@example.com", Role::User).await;

        let Ok(CheckoutOutcome::AwaitingPayment { reference: late_ref, .. }) =
            h.checkout.checkout(&late, event_id, &cart(tt.id, 1), 517_500).await
        else {
            panic!("checkout failed");
        };
        let Ok(CheckoutOutcome::AwaitingPayment { reference: early_ref, .. }) =
            h.checkout.checkout(&early, event_id, &cart(tt.id, 1), 517_500).await
        else {
            panic!("checkout failed");
        };
        assert!(h.checkout.verify(&early, &early_ref).await.is_ok());

        assert!(matches!(
            h.checkout.verify(&late, &late_ref).await,
            Err(AppError::Conflict(_))
        ));
        let Ok(Some(payment)) = h.repo.find_payment_by_reference(&late_ref).await else {
            panic!("payment missing");
        };
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(matches!(
            h.checkout.verify(&late, &late_ref).await,
            Err(AppError::InvalidRequest(_))
        ));
        let Ok(Some(stored)) = h.repo.find_ticket_type(tt.id).await else {
            panic!("ticket type missing");
        };
        assert_eq!(stored.sold, 1);
    }

    #[tokio::test]
    async fn charge_after_cancellation_is_marked_failed() {
        let h = Harness::new();
        let (org, event_id, tt) = published_event(&h, false).await;
        let buyer = h.user("fan@example.com", Role::User).await;
        let Ok(CheckoutOutcome::AwaitingPayment { reference, .. }) =
            h.checkout.checkout(&buyer, event_id, &cart(tt, 1), 517_500).await
        else {
            panic!("checkout failed");
        };
        assert!(h.events.cancel(&org, event_id).await.is_ok());

        assert!(matches!(
            h.checkout.verify(&buyer, &reference).await,
            Err(AppError::Conflict(_))
        ));
        let Ok(Some(payment)) = h.repo.find_payment_by_reference(&reference).await else {
            panic!("payment missing");
        };
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(h.mailer.sent_to("fan@example.com").await.is_empty());
    }
}
