//! Development mailer that logs instead of sending.

use async_trait::async_trait;

use super::{EmailMessage, MailError, Mailer};

/// Logs every message through `tracing` at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMailer;

impl ConsoleMailer {
    /// Creates a console mailer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.html,
            "email (console transport)"
        );
        Ok(())
    }
}
