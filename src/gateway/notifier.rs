//! Investor notification via an HTTP mail relay

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use super::{NotificationError, Notifier};
use crate::config::MailConfig;

pub(super) const AGREEMENT_SUBJECT: &str = "Loan Investment Agreement";

/// Outbound message accepted by the relay
#[derive(Debug, Serialize)]
struct MailMessage<'a> {
    from: &'a str,
    to: String,
    subject: &'a str,
    html: String,
}

/// Sends agreement notices through a JSON mail relay endpoint
#[derive(Clone)]
pub struct MailRelayNotifier {
    http_client: reqwest::Client,
    config: MailConfig,
}

impl MailRelayNotifier {
    pub fn new(config: MailConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            config,
        }
    }

    pub fn recipient_address(&self, investor_id: Uuid) -> String {
        recipient_address(investor_id, &self.config.recipient_domain)
    }
}

pub(super) fn recipient_address(investor_id: Uuid, domain: &str) -> String {
    format!("investor-{}@{}", investor_id, domain)
}

pub(super) fn agreement_body(agreement_url: &str) -> String {
    format!(
        "<h1>Investment Agreement</h1>\
         <p>Please find your investment agreement at the following link:</p>\
         <p><a href=\"{agreement_url}\">View Agreement</a></p>"
    )
}

#[async_trait]
impl Notifier for MailRelayNotifier {
    async fn notify(
        &self,
        investor_id: Uuid,
        agreement_url: &str,
    ) -> Result<(), NotificationError> {
        let message = MailMessage {
            from: &self.config.from_address,
            to: self.recipient_address(investor_id),
            subject: AGREEMENT_SUBJECT,
            html: agreement_body(agreement_url),
        };

        let mut request = self.http_client.post(&self.config.api_url).json(&message);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected(status.as_u16()));
        }

        tracing::debug!(investor_id = %investor_id, "Agreement notice accepted by mail relay");
        Ok(())
    }
}

/// Records notices in the log only; used when no mail transport is configured
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        investor_id: Uuid,
        agreement_url: &str,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            investor_id = %investor_id,
            agreement_url = %agreement_url,
            "Mail delivery not configured, agreement notice logged only"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_url: String) -> MailConfig {
        MailConfig {
            api_url,
            api_key: Some("relay-key".to_string()),
            from_address: "noreply@example.com".to_string(),
            recipient_domain: "example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_notice_is_posted_to_relay() {
        let server = MockServer::start().await;
        let investor_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer relay-key"))
            .and(body_partial_json(serde_json::json!({
                "from": "noreply@example.com",
                "to": format!("investor-{}@example.com", investor_id),
                "subject": "Loan Investment Agreement",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = MailRelayNotifier::new(config(format!("{}/send", server.uri())));
        notifier
            .notify(investor_id, "https://agreements.example.com/a.pdf")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_relay_rejection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let notifier = MailRelayNotifier::new(config(format!("{}/send", server.uri())));
        let err = notifier
            .notify(Uuid::new_v4(), "https://agreements.example.com/a.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Rejected(503)));
    }

    #[test]
    fn test_body_links_agreement() {
        let body = agreement_body("https://agreements.example.com/a.pdf");
        assert!(body.contains("href=\"https://agreements.example.com/a.pdf\""));
    }
}
