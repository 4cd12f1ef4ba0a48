//! Outbound email.
//!
//! Services build an [`EmailMessage`] from one of the [`templates`] and
//! hand it to a [`Mailer`]. Delivery is always best-effort from the
//! caller's point of view: see [`send_best_effort`].

pub mod console;
pub mod memory;
pub mod smtp;
pub mod templates;

use async_trait::async_trait;

pub use console::ConsoleMailer;
pub use memory::MemoryMailer;
pub use smtp::SmtpMailer;

/// Errors raised while building or delivering a message.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Sender or recipient address could not be parsed.
    #[error("invalid address {address}: {reason}")]
    InvalidAddress {
        /// Offending address.
        address: String,
        /// Parser message.
        reason: String,
    },

    /// The message could not be assembled.
    #[error("failed to build message: {0}")]
    Build(String),

    /// The transport rejected or failed to deliver the message.
    #[error("delivery failed: {0}")]
    Transport(String),
}

/// A rendered HTML email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
}

/// Delivers rendered messages.
#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] if the message cannot be built or delivered.
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

/// Sends a message and logs failures instead of returning them.
pub async fn send_best_effort(mailer: &dyn Mailer, message: EmailMessage) {
    let to = message.to.clone();
    let subject = message.subject.clone();
    match mailer.send(message).await {
        Ok(()) => tracing::debug!(%to, %subject, "email sent"),
        Err(e) => tracing::warn!(%to, %subject, error = %e, "email delivery failed"),
    }
}
