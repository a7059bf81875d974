//! Email channel — async SMTP submission via lettre.

use async_trait::async_trait;

use visitwatch_core::config::SmtpConfig;
use visitwatch_core::error::{Result, WatchError};
use visitwatch_core::settings::UserRecord;

use crate::dispatch::Notifier;
use crate::render::Report;

/// Sends rendered reports over authenticated STARTTLS SMTP. This channel is
/// digest-capable: daily accumulations flush through it.
pub struct EmailNotifier {
    config: SmtpConfig,
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        use lettre::{
            AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, message::Mailbox,
            message::header::ContentType, transport::smtp::authentication::Credentials,
        };

        let from_name = self.config.from_name.as_deref().unwrap_or("VisitWatch");
        let from_mailbox: Mailbox = format!("{from_name} <{}>", self.config.from_address)
            .parse()
            .map_err(|e| WatchError::Dispatch(format!("Invalid from: {e}")))?;

        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| WatchError::Dispatch(format!("Invalid to: {e}")))?;

        let email = LettreMessage::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| WatchError::Dispatch(format!("Build email: {e}")))?;

        let creds = Credentials::new(self.config.username.clone(), self.config.password.clone());

        let mailer = AsyncSmtpTransport::<lettre::Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| WatchError::Dispatch(format!("SMTP relay: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| WatchError::Dispatch(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Email sent to: {to}");
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    fn digest_capable(&self) -> bool {
        true
    }

    async fn send(&self, user: &UserRecord, report: &Report) -> Result<()> {
        if user.email_address.is_empty() {
            return Err(WatchError::Dispatch(format!(
                "user {} has no email address",
                user.user_id
            )));
        }
        self.send_email(&user.email_address, &report.subject, &report.body)
            .await
    }
}
