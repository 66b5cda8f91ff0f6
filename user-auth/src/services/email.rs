use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;

/// Outgoing mail. An `Err` is a delivery failure the caller must roll back.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl SmtpEmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let mailer = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid SMTP relay: {}", e)))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        let from = config
            .from
            .parse()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid SMTP_FROM: {}", e)))?;

        tracing::info!(host = %config.host, port = config.port, "Email service initialized");

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e: lettre::address::AddressError| AppError::EmailError(e.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())?;

        // SMTP is blocking; keep it off the async workers
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records outgoing mail instead of sending it. Addresses in `fail_for` are refused.
#[derive(Default)]
pub struct MockEmailService {
    pub sent: Mutex<Vec<SentEmail>>,
    pub fail_for: Mutex<Vec<String>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        if let Ok(mut fail) = self.fail_for.lock() {
            fail.push(address.to_string());
        }
    }

    /// Accept mail for an address previously passed to `fail_for`.
    pub fn restore(&self, address: &str) {
        if let Ok(mut fail) = self.fail_for.lock() {
            fail.retain(|a| a != address);
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let refused = self
            .fail_for
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock mailer poisoned: {}", e)))?
            .iter()
            .any(|a| a == to);
        if refused {
            return Err(AppError::EmailError(format!("Mailbox {} refused", to)));
        }

        self.sent
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock mailer poisoned: {}", e)))?
            .push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    #[test]
    fn test_smtp_service_creation() {
        let config = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            user: "mailer".into(),
            password: Secret::new("pw".into()),
            from: "Control Panel <no-reply@example.com>".into(),
        };
        assert!(SmtpEmailService::new(&config).is_ok());
    }

    #[test]
    fn test_smtp_service_rejects_bad_from() {
        let config = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            user: "mailer".into(),
            password: Secret::new("pw".into()),
            from: "not an address".into(),
        };
        assert!(SmtpEmailService::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_mock_records_and_refuses() {
        let mailer = MockEmailService::new();
        mailer.fail_for("bounce@example.com");

        mailer.send("ok@example.com", "Hi", "body").await.unwrap();
        let err = mailer.send("bounce@example.com", "Hi", "body").await.unwrap_err();

        assert!(matches!(err, AppError::EmailError(_)));
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent()[0].to, "ok@example.com");
    }
}
