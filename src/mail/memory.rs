//! Mailer that keeps messages in memory for inspection.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EmailMessage, MailError, Mailer};

/// Records every sent message. Can be switched into a failing mode to
/// exercise best-effort delivery paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
    failing: Arc<std::sync::atomic::AtomicBool>,
}

impl MemoryMailer {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Copies of all messages sent so far.
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.outbox.lock().await.clone()
    }

    /// Messages addressed to `to`.
    pub async fn sent_to(&self, to: &str) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .await
            .iter()
            .filter(|m| m.to == to)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MailError::Transport("outbox unavailable".into()));
        }
        self.outbox.lock().await.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::send_best_effort;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.into(),
            subject: "hello".into(),
            html: "<p>hi</p>".into(),
        }
    }

    #[tokio::test]
    async fn records_messages() {
        let mailer = MemoryMailer::new();
        assert!(mailer.send(message("a@example.com")).await.is_ok());
        assert!(mailer.send(message("b@example.com")).await.is_ok());
        assert_eq!(mailer.sent().await.len(), 2);
        assert_eq!(mailer.sent_to("b@example.com").await.len(), 1);
    }

    #[tokio::test]
    async fn best_effort_swallows_failures() {
        let mailer = MemoryMailer::new();
        mailer.set_failing(true);
        send_best_effort(&mailer, message("a@example.com")).await;
        assert!(mailer.sent().await.is_empty());
    }
}
