//! Checkout and ticket DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{EventId, OrderLine, PaymentBreakdown, TicketTypeId};
use crate::persistence::models::{Payment, Ticket};
use crate::service::{CartItem, CheckoutOutcome, Quote, Settlement};

/// One requested line.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct CartItemDto {
    /// Ticket type.
    pub ticket_type_id: TicketTypeId,
    /// Quantity, 1 to 10.
    pub quantity: u32,
}

impl From<CartItemDto> for CartItem {
    fn from(dto: CartItemDto) -> Self {
        Self {
            ticket_type_id: dto.ticket_type_id,
            quantity: dto.quantity,
        }
    }
}

/// Request body for `POST /checkout/quote`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteRequest {
    /// Event.
    pub event_id: EventId,
    /// Selection.
    pub items: Vec<CartItemDto>,
}

/// Response body for `POST /checkout/quote`.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    /// Event.
    pub event_id: EventId,
    /// Priced lines.
    pub items: Vec<OrderLine>,
    /// Fee breakdown.
    pub breakdown: PaymentBreakdown,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            event_id: quote.event.id,
            items: quote.lines,
            breakdown: quote.breakdown,
        }
    }
}

/// Request body for `POST /checkout`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Event.
    pub event_id: EventId,
    /// Selection.
    pub items: Vec<CartItemDto>,
    /// Total shown to the buyer, in kobo.
    pub amount: i64,
}

/// Response body for `POST /checkout`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    /// `pending` (pay at `authorization_url`) or `completed` (free order).
    pub status: String,
    /// Payment reference, paid orders only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Gateway payment page, paid orders only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    /// Fee breakdown.
    pub breakdown: PaymentBreakdown,
    /// Issued tickets, free orders only.
    pub tickets: Vec<Ticket>,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        match outcome {
            CheckoutOutcome::AwaitingPayment {
                reference,
                authorization_url,
                breakdown,
            } => Self {
                status: "pending".to_string(),
                reference: Some(reference),
                authorization_url: Some(authorization_url),
                breakdown,
                tickets: Vec::new(),
            },
            CheckoutOutcome::Completed { breakdown, tickets } => Self {
                status: "completed".to_string(),
                reference: None,
                authorization_url: None,
                breakdown,
                tickets,
            },
        }
    }
}

/// Response body for `POST /checkout/{reference}/verify`.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    /// The settled payment.
    pub payment: Payment,
    /// Its tickets.
    pub tickets: Vec<Ticket>,
}

impl From<Settlement> for VerifyResponse {
    fn from(settlement: Settlement) -> Self {
        Self {
            payment: settlement.payment,
            tickets: settlement.tickets,
        }
    }
}
