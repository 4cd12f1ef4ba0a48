//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::FeeSchedule;
use crate::mail::Mailer;
use crate::payment::PaymentGateway;
use crate::persistence::Repository;
use crate::service::{AuthService, AuthSettings, CheckoutService, EventService, PayoutService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Accounts and sessions.
    pub auth: Arc<AuthService>,
    /// Events, ticket types and favorites.
    pub events: Arc<EventService>,
    /// Checkout, settlement and tickets.
    pub checkout: Arc<CheckoutService>,
    /// Organizer payouts and admin review.
    pub payouts: Arc<PayoutService>,
}

impl AppState {
    /// Wires every service to the same storage and outbound adapters.
    #[must_use]
    pub fn new(
        repo: Arc<dyn Repository>,
        mailer: Arc<dyn Mailer>,
        gateway: Arc<dyn PaymentGateway>,
        settings: AuthSettings,
    ) -> Self {
        let checkout = CheckoutService::new(
            Arc::clone(&repo),
            gateway,
            Arc::clone(&mailer),
            FeeSchedule::STANDARD,
            settings.app_base_url.clone(),
        );
        Self {
            events: Arc::new(EventService::new(Arc::clone(&repo))),
            checkout: Arc::new(checkout),
            payouts: Arc::new(PayoutService::new(Arc::clone(&repo), Arc::clone(&mailer))),
            auth: Arc::new(AuthService::new(repo, mailer, settings)),
        }
    }
}
