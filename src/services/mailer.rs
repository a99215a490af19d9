use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Failed to deliver mail to {to}: {reason}")]
    Delivery { to: String, reason: String },
}

/// Recipient of an outgoing mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

impl Recipient {
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Outgoing account mail
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_welcome(&self, to: &Recipient, url: &str) -> Result<(), MailError>;

    async fn send_password_reset(&self, to: &Recipient, url: &str) -> Result<(), MailError>;
}

/// Writes mails to the log instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_welcome(&self, to: &Recipient, url: &str) -> Result<(), MailError> {
        tracing::info!(to = %to.email, "Welcome mail for {}: {}", to.first_name(), url);
        Ok(())
    }

    async fn send_password_reset(&self, to: &Recipient, url: &str) -> Result<(), MailError> {
        tracing::info!(to = %to.email, "Password reset mail for {}: {}", to.first_name(), url);
        Ok(())
    }
}
