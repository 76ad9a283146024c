use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpSettings;
use crate::domain::errors::DomainError;
use crate::domain::order::DeliveryReceipt;
use crate::domain::ports::Notifier;

pub const DEFAULT_SENDER: &str = "\"Crypto Service\" <noreply@crypto.com>";

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings, timeout: Duration) -> Result<Self, DomainError> {
        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| DomainError::NotificationFailed(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };

        let mut builder = builder.port(settings.port).timeout(Some(timeout));
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox(&settings.from)?,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DomainError> {
    address
        .parse()
        .map_err(|e| DomainError::NotificationFailed(format!("invalid address '{}': {}", address, e)))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(
        &self,
        destination: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, DomainError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(destination)?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| DomainError::NotificationFailed(e.to_string()))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| DomainError::NotificationFailed(e.to_string()))?;

        Ok(DeliveryReceipt {
            destination: destination.to_string(),
            detail: format!("smtp {}", response.code()),
        })
    }
}

/// Stand-in used when no SMTP relay is configured: the rendered message is
/// written to the log instead of being delivered.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        destination: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, DomainError> {
        log::info!("Email to {} [{}]:\n{}", destination, subject, html_body);
        Ok(DeliveryReceipt {
            destination: destination.to_string(),
            detail: "logged".to_string(),
        })
    }
}
