//! Outbound notification contract. The SMTP implementation lives in `cdn-notifications`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    /// Plain-text part
    pub body: String,
    pub html_body: Option<String>,
    /// Overrides the configured sender
    pub from: Option<String>,
    pub reply_to: Option<String>,
}

impl EmailMessage {
    /// A plain-text message to a single recipient.
    pub fn to_recipient(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: vec![recipient.into()],
            subject: subject.into(),
            body: body.into(),
            html_body: None,
            from: None,
            reply_to: None,
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html_body = Some(html.into());
        self
    }
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError>;

    /// Whether a transport is set up. Sending through an unconfigured
    /// service fails with [`NotificationError::ServiceUnavailable`].
    async fn is_configured(&self) -> Result<bool, NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Failed to send notification: {0}")]
    SendError(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Notification service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Notification configuration error: {0}")]
    ConfigurationError(String),
}
