//! Alert delivery.
//!
//! Notifiers are fire-and-forget from the caller's point of view: `notify`
//! never fails. `SmtpNotifier::send` exposes the typed outcome for callers
//! (and tests) that need it.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use weatherwatch_core::{MailConfig, NotificationError};

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// SMTP reply codes that mean the credentials were refused.
const AUTH_REPLY_CODES: [&str; 3] = ["530", "534", "535"];

/// One triggered alert, addressed to one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertNotice {
    pub recipient: String,
    pub city: String,
    pub threshold_c: f64,
    pub current_temp_c: f64,
}

/// Rendered mail for an [`AlertNotice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailContent {
    pub subject: String,
    pub body: String,
}

impl AlertNotice {
    pub fn compose(&self) -> MailContent {
        MailContent {
            subject: format!("Temperature Alert for {}", self.city),
            body: format!(
                "Alert: The temperature in {} has exceeded your set threshold of {} °C! \
                 Current temperature: {} °C.",
                self.city, self.threshold_c, self.current_temp_c
            ),
        }
    }
}

/// Delivers alert notices. Failures are handled inside the notifier.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &AlertNotice);
}

/// Sends alert mail over SMTP with STARTTLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpNotifier {
    /// Build a notifier from mail settings. Does not connect.
    ///
    /// # Errors
    ///
    /// Returns `TransportFailed` when the relay or sender address is unusable.
    pub fn new(config: &MailConfig) -> Result<Self, NotificationError> {
        let sender: Mailbox = config.sender.parse().map_err(|e| {
            NotificationError::TransportFailed(format!("invalid sender {:?}: {e}", config.sender))
        })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotificationError::TransportFailed(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.sender.clone(),
                config.credential.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { transport, sender })
    }

    /// Send one alert mail.
    ///
    /// # Errors
    ///
    /// `InvalidRecipient` for an unparsable address, `AuthFailed` when the
    /// server refuses the credentials, `TransportFailed` otherwise.
    pub async fn send(&self, notice: &AlertNotice) -> Result<(), NotificationError> {
        let recipient: Mailbox = notice.recipient.parse().map_err(|e| {
            NotificationError::InvalidRecipient(format!("{:?}: {e}", notice.recipient))
        })?;

        let content = notice.compose();
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(content.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(content.body)
            .map_err(|e| NotificationError::TransportFailed(format!("cannot build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(classify_smtp_error)
    }
}

fn classify_smtp_error(err: lettre::transport::smtp::Error) -> NotificationError {
    let code = err.status().map(|c| c.to_string());
    match code {
        Some(code) if AUTH_REPLY_CODES.contains(&code.as_str()) => {
            NotificationError::AuthFailed(err.to_string())
        }
        _ => NotificationError::TransportFailed(err.to_string()),
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notice: &AlertNotice) {
        match self.send(notice).await {
            Ok(()) => tracing::info!(
                recipient = %notice.recipient,
                city = %notice.city,
                "Alert mail sent"
            ),
            Err(e) => tracing::error!(
                recipient = %notice.recipient,
                city = %notice.city,
                "Alert mail not sent: {}",
                e
            ),
        }
    }
}

/// Logs alerts instead of mailing them. Used when mail is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &AlertNotice) {
        let content = notice.compose();
        tracing::warn!(
            recipient = %notice.recipient,
            city = %notice.city,
            subject = %content.subject,
            "Mail not configured, alert not sent: {}",
            content.body
        );
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn notice(recipient: &str) -> AlertNotice {
        AlertNotice {
            recipient: recipient.to_string(),
            city: "Chennai".to_string(),
            threshold_c: 30.0,
            current_temp_c: 34.56,
        }
    }

    fn mail_config(port: u16) -> MailConfig {
        MailConfig {
            host: "localhost".to_string(),
            port,
            sender: "alerts@example.com".to_string(),
            credential: "secret".to_string(),
        }
    }

    #[test]
    fn test_compose_names_city_threshold_and_current() {
        let content = notice("ops@example.com").compose();
        assert_eq!(content.subject, "Temperature Alert for Chennai");
        assert!(content.body.contains("Chennai"));
        assert!(content.body.contains("threshold of 30 °C"));
        assert!(content.body.contains("Current temperature: 34.56 °C"));
    }

    #[test]
    fn test_invalid_sender_is_rejected_at_construction() {
        let mut config = mail_config(587);
        config.sender = "not an address".to_string();
        assert!(matches!(
            SmtpNotifier::new(&config),
            Err(NotificationError::TransportFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails_before_connecting() {
        let notifier = SmtpNotifier::new(&mail_config(587)).unwrap();
        let err = notifier.send(&notice("nobody-at-nowhere")).await.unwrap_err();
        assert!(matches!(err, NotificationError::InvalidRecipient(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_failure() {
        // Nothing listens on the discard port
        let notifier = SmtpNotifier::new(&mail_config(9)).unwrap();
        let err = notifier.send(&notice("ops@example.com")).await.unwrap_err();
        assert!(matches!(err, NotificationError::TransportFailed(_)));
    }

    #[tokio::test]
    async fn test_notify_swallows_failures() {
        let notifier = SmtpNotifier::new(&mail_config(9)).unwrap();
        notifier.notify(&notice("ops@example.com")).await;
        notifier.notify(&notice("broken")).await;
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        LogNotifier.notify(&notice("ops@example.com")).await;
    }
}
