use async_trait::async_trait;
use cdn_core::notifications::{EmailMessage, NotificationError, NotificationService};
use cdn_core::{SmtpSettings, SmtpTlsMode};
use lettre::{
    message::{Mailbox, MultiPart, SinglePart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters, TlsParametersBuilder},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

/// Sends mail through a single configured SMTP relay.
///
/// When SMTP is disabled in settings no transport is built and every send
/// fails with `ServiceUnavailable`.
pub struct SmtpNotificationService {
    settings: SmtpSettings,
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpNotificationService {
    pub fn new(settings: SmtpSettings) -> Result<Self, NotificationError> {
        let mailer = if settings.enabled {
            Some(Self::build_transport(&settings)?)
        } else {
            None
        };
        Ok(Self { settings, mailer })
    }

    fn tls_parameters(host: &str) -> Result<TlsParameters, NotificationError> {
        let local = host == "localhost" || host == "127.0.0.1";
        TlsParametersBuilder::new(host.to_string())
            .dangerous_accept_invalid_certs(local)
            .dangerous_accept_invalid_hostnames(local)
            .build()
            .map_err(|e| NotificationError::ConfigurationError(e.to_string()))
    }

    fn build_transport(
        settings: &SmtpSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            if !username.is_empty() {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }
        }

        let mailer = match settings.tls_mode {
            SmtpTlsMode::None => builder.build(),
            SmtpTlsMode::Starttls => builder
                .tls(Tls::Required(Self::tls_parameters(&settings.host)?))
                .build(),
            SmtpTlsMode::Tls => builder
                .tls(Tls::Wrapper(Self::tls_parameters(&settings.host)?))
                .build(),
        };

        Ok(mailer)
    }

    fn sender(&self) -> Result<Mailbox, NotificationError> {
        let address = self.settings.from_address.parse().map_err(|e| {
            NotificationError::ConfigurationError(format!(
                "invalid from_address '{}': {}",
                self.settings.from_address, e
            ))
        })?;
        Ok(Mailbox::new(self.settings.from_name.clone(), address))
    }

    /// Builds one message per recipient. Plain text is always present; HTML
    /// is attached as an alternative when the caller provides it.
    pub fn build_message(
        &self,
        recipient: &str,
        message: &EmailMessage,
    ) -> Result<Message, NotificationError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| NotificationError::InvalidRecipient(recipient.to_string()))?;

        let mut builder = Message::builder()
            .from(self.sender()?)
            .to(to)
            .subject(message.subject.clone());

        if let Some(reply_to) = &message.reply_to {
            let reply_to: Mailbox = reply_to
                .parse()
                .map_err(|_| NotificationError::InvalidRecipient(reply_to.clone()))?;
            builder = builder.reply_to(reply_to);
        }

        let built = match &message.html_body {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(message.body.clone()))
                    .singlepart(SinglePart::html(html.clone())),
            ),
            None => builder.singlepart(SinglePart::plain(message.body.clone())),
        };

        built.map_err(|e| NotificationError::SendError(e.to_string()))
    }
}

#[async_trait]
impl NotificationService for SmtpNotificationService {
    async fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError> {
        let mailer = self.mailer.as_ref().ok_or_else(|| {
            NotificationError::ServiceUnavailable("SMTP is not enabled".to_string())
        })?;

        if message.to.is_empty() {
            return Err(NotificationError::InvalidRecipient(
                "no recipients given".to_string(),
            ));
        }

        // Build every message first so a bad address fails before anything is sent
        let emails = message
            .to
            .iter()
            .map(|recipient| self.build_message(recipient, &message))
            .collect::<Result<Vec<_>, _>>()?;

        for (recipient, email) in message.to.iter().zip(emails) {
            if let Err(e) = mailer.send(email).await {
                error!("Failed to send email to {}: {}", recipient, e);
                return Err(NotificationError::SendError(e.to_string()));
            }
            info!("Sent '{}' to {}", message.subject, recipient);
        }

        Ok(())
    }

    async fn is_configured(&self) -> Result<bool, NotificationError> {
        Ok(self.mailer.is_some())
    }
}
