//! Investor notification over SMTP

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use uuid::Uuid;

use super::notifier::{agreement_body, recipient_address, AGREEMENT_SUBJECT};
use super::{NotificationError, Notifier};
use crate::config::SmtpConfig;

/// Sends agreement notices through an authenticated STARTTLS relay
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipient_domain: String,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Result<Self, NotificationError> {
        let from = config
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidMessage(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .timeout(Some(Duration::from_secs(10)))
            .build();

        Ok(Self {
            transport,
            from,
            recipient_domain: config.recipient_domain,
        })
    }

    fn agreement_message(
        &self,
        investor_id: Uuid,
        agreement_url: &str,
    ) -> Result<Message, NotificationError> {
        let to = recipient_address(investor_id, &self.recipient_domain)
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidMessage(e.to_string()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(AGREEMENT_SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(agreement_body(agreement_url))
            .map_err(|e| NotificationError::InvalidMessage(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(
        &self,
        investor_id: Uuid,
        agreement_url: &str,
    ) -> Result<(), NotificationError> {
        let message = self.agreement_message(investor_id, agreement_url)?;
        self.transport.send(message).await?;

        tracing::debug!(investor_id = %investor_id, "Agreement notice accepted by SMTP server");
        Ok(())
    }
}
