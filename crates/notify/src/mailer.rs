//! Mail delivery seam.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Sends a message to one recipient. Real transports (SMTP) plug in here;
/// the shipped implementation only logs.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Mailer that writes the message to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        tracing::info!(to, subject, body, "mail (log transport)");
        Ok(())
    }
}
