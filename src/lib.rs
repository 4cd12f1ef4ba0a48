//! # tixhub
//!
//! REST backend for an event ticketing platform: accounts, events with
//! ticket tiers, checkout with server-side fee settlement, ticket
//! admission, and organizer payouts reviewed in bulk by administrators.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers + extractors (api/)
//!     │
//!     ├── AuthService / EventService / CheckoutService / PayoutService (service/)
//!     │       │              │
//!     │       │              ├── FeeSchedule (domain/fees)
//!     │       │              └── PaymentGateway (payment/: Paystack, sandbox)
//!     │       └── Mailer (mail/: SMTP, console, memory)
//!     │
//!     └── Repository (persistence/: PostgreSQL, in-memory)
//! ```
//!
//! Every purchase total is recomputed on the server from stored ticket
//! prices; client-submitted and gateway-reported amounts are only accepted
//! within [`domain::FeeSchedule::amount_tolerance`] of that total.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod payment;
pub mod persistence;
pub mod service;
