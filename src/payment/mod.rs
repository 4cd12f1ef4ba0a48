//! Payment gateway integration.
//!
//! Checkout initializes a transaction for the computed total and sends the
//! buyer to the returned authorization URL. Settlement later asks the
//! gateway what actually happened through [`PaymentGateway::verify`].

pub mod paystack;
pub mod sandbox;

use async_trait::async_trait;

pub use paystack::PaystackGateway;
pub use sandbox::SandboxGateway;

/// Errors raised by a payment gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The HTTP request failed or timed out.
    #[error("gateway request failed: {0}")]
    Http(String),

    /// The gateway answered but refused the operation.
    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    /// The gateway has no transaction with this reference.
    #[error("unknown transaction {0}")]
    UnknownTransaction(String),
}

/// Transaction to initialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeRequest {
    /// Payer email address.
    pub email: String,
    /// Amount to charge in minor units.
    pub amount: i64,
    /// Our unique payment reference.
    pub reference: String,
    /// Where the gateway redirects after payment.
    pub callback_url: String,
}

/// Result of initializing a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initialized {
    /// URL the buyer must visit to pay.
    pub authorization_url: String,
}

/// Outcome of a transaction as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Paid.
    Success,
    /// Declined, abandoned or reversed.
    Failed,
    /// Not finished yet.
    Pending,
}

/// Verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    /// Transaction outcome.
    pub status: TransactionStatus,
    /// Amount the gateway actually charged, in minor units.
    pub amount: i64,
}

/// A payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync + std::fmt::Debug {
    /// Starts a transaction and returns where to send the buyer.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway is unreachable or refuses.
    async fn initialize(&self, request: InitializeRequest) -> Result<Initialized, GatewayError>;

    /// Looks up the outcome of a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway is unreachable or does not
    /// know the reference.
    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError>;
}
