//! Service layer: business logic orchestration.
//!
//! Each service owns an `Arc<dyn Repository>` plus the outbound adapters it
//! needs ([`crate::mail::Mailer`], [`crate::payment::PaymentGateway`]).
//! Authorization is decided here from the [`AuthUser`] the handler passes
//! in, never in the handlers themselves.

pub mod auth_service;
pub mod checkout_service;
pub mod event_service;
pub mod payout_service;

pub use auth_service::{AuthService, AuthSettings, AuthUser, Claims, Session};
pub use checkout_service::{CartItem, CheckoutOutcome, CheckoutService, Quote, Settlement};
pub use event_service::{EventDetails, EventInput, EventQuery, EventService, TicketTypeInput};
pub use payout_service::{BulkAction, PayoutService};

/// Default page size.
pub const DEFAULT_PER_PAGE: u32 = 20;
/// Largest accepted page size.
pub const MAX_PER_PAGE: u32 = 100;

/// A validated page selection (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl PageRequest {
    /// Builds a page selection, clamping `page` to at least 1 and
    /// `per_page` to `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    /// Page number, starting at 1.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Items per page.
    #[must_use]
    pub const fn per_page(&self) -> u32 {
        self.per_page
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Matches across all pages.
    pub total: u64,
    /// Page number.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Wraps a fetched page.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page(),
            per_page: request.per_page(),
        }
    }

    /// Number of pages needed for `total` items.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.per_page))
    }
}
