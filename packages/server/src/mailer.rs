use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Mail transport error: {0}")]
    Transport(String),
}

/// Outbound mail collaborator.
///
/// Delivery is best-effort: callers on the registration path report a
/// failure to the client but never roll back committed state because of it.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Mailer that writes outbound messages to the log instead of a transport.
///
/// The platform treats mail transport as an external system; deployments
/// swap in a real implementation behind the same trait.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if to.is_empty() {
            return Err(MailError::InvalidRecipient(to.to_string()));
        }
        info!(to = %to, subject = %subject, body_len = body.len(), "Outbound mail");
        Ok(())
    }
}
