//! SMTP delivery through `lettre`.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use super::{EmailMessage, MailError, Mailer};
use crate::config::MailConfig;

/// Sends mail through an SMTP relay.
///
/// `lettre`'s [`SmtpTransport`] is blocking, so each send runs on the
/// blocking thread pool.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpMailer {
    /// Builds a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] if the sender address is invalid or the relay
    /// host cannot be resolved into a TLS transport.
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let from = parse_mailbox(&format!("{} <{}>", config.from_name, config.from_email))?;

        let mut builder = SmtpTransport::relay(&config.smtp.host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
            .port(config.smtp.port);
        if let (Some(user), Some(pass)) = (&config.smtp.username, &config.smtp.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| {
        MailError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        }
    })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&message.to)?)
            .subject(message.subject)
            .header(ContentType::TEXT_HTML)
            .body(message.html)
            .map_err(|e| MailError::Build(e.to_string()))?;

        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || {
            transport
                .send(&email)
                .map_err(|e| MailError::Transport(e.to_string()))
        })
        .await
        .map_err(|e| MailError::Transport(format!("email task failed: {e}")))?
        .map(|_| ())
    }
}
