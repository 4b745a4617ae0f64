//! Customer notifications for order status changes: HTML email over SMTP and
//! WhatsApp messages through Twilio.

pub mod email;
pub mod error;
pub mod phone;
pub mod plan;
pub(crate) mod retry;
pub mod templates;
pub mod whatsapp;

use async_trait::async_trait;
use butcher_core::AppConfig;

pub use email::SmtpMailer;
pub use error::NotifyError;
pub use phone::format_lebanese_number;
pub use plan::{EmailKind, NotificationPlan};
pub use templates::{
    confirmation_email, rejection_email, whatsapp_status_message, EmailMessage, OrderSummary,
};
pub use whatsapp::{Delivery, WhatsAppClient};

/// Outbound channels the server drives after an order changes status.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the message could not be delivered.
    async fn send_email(&self, to: &str, message: &EmailMessage) -> Result<(), NotifyError>;

    /// # Errors
    ///
    /// Returns [`NotifyError`] if the message could not be delivered.
    async fn send_whatsapp(&self, to: &str, body: &str) -> Result<Delivery, NotifyError>;
}

/// Production [`Notifier`]. Email is optional; WhatsApp falls back to
/// log-only mode when Twilio is not configured.
pub struct NotifyService {
    mailer: Option<SmtpMailer>,
    whatsapp: WhatsAppClient,
}

impl NotifyService {
    #[must_use]
    pub fn new(mailer: Option<SmtpMailer>, whatsapp: WhatsAppClient) -> Self {
        Self { mailer, whatsapp }
    }

    /// Builds both channels from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the SMTP relay or HTTP client cannot be
    /// constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, NotifyError> {
        let mailer = config
            .smtp
            .as_ref()
            .map(|smtp| SmtpMailer::new(smtp, config.notify_timeout_secs))
            .transpose()?;
        if mailer.is_none() {
            tracing::warn!("SMTP not configured; order emails are disabled");
        }

        let whatsapp = WhatsAppClient::new(
            config.twilio.clone(),
            config.notify_timeout_secs,
            config.notify_max_retries,
        )?;
        if !whatsapp.is_configured() {
            tracing::warn!("Twilio not configured; WhatsApp messages will only be logged");
        }

        Ok(Self::new(mailer, whatsapp))
    }
}

#[async_trait]
impl Notifier for NotifyService {
    async fn send_email(&self, to: &str, message: &EmailMessage) -> Result<(), NotifyError> {
        match &self.mailer {
            Some(mailer) => mailer.send(to, message).await,
            None => Err(NotifyError::NotConfigured("email")),
        }
    }

    async fn send_whatsapp(&self, to: &str, body: &str) -> Result<Delivery, NotifyError> {
        self.whatsapp.send(to, body).await
    }
}
