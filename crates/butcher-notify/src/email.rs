use std::time::Duration;

use butcher_core::SmtpConfig;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::NotifyError;
use crate::templates::EmailMessage;

/// Port on which the server speaks implicit TLS; others use STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Pooled async SMTP sender.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// # Errors
    ///
    /// - [`NotifyError::Smtp`] if the relay cannot be configured for `config.host`.
    /// - [`NotifyError::Address`] if `config.from` is not a valid mailbox.
    pub fn new(config: &SmtpConfig, timeout_secs: u64) -> Result<Self, NotifyError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::Address(format!("sender '{}': {e}", config.from)))?;

        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(timeout_secs)))
            .build();

        Ok(Self { transport, from })
    }

    /// # Errors
    ///
    /// - [`NotifyError::Address`] if `to` is not a valid address.
    /// - [`NotifyError::Smtp`] if the server rejects the message.
    pub async fn send(&self, to: &str, message: &EmailMessage) -> Result<(), NotifyError> {
        let email = build_message(&self.from, to, message)?;
        self.transport.send(email).await?;
        tracing::info!(to, subject = %message.subject, "email sent");
        Ok(())
    }
}

fn build_message(from: &Mailbox, to: &str, message: &EmailMessage) -> Result<Message, NotifyError> {
    let recipient = to
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::Address(format!("recipient '{to}': {e}")))?;

    Message::builder()
        .from(from.clone())
        .to(recipient)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(message.html.clone())
        .map_err(|e| NotifyError::Address(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            subject: "Order Confirmation - Butcher Shop".to_owned(),
            html: "<p>hi</p>".to_owned(),
        }
    }

    #[test]
    fn builds_html_message() {
        let from: Mailbox = "Butcher Shop <shop@example.com>".parse().unwrap();
        let email = build_message(&from, "customer@example.com", &message()).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("Subject: Order Confirmation - Butcher Shop"));
        assert!(raw.contains("Content-Type: text/html"));
    }

    #[test]
    fn rejects_invalid_recipient() {
        let from: Mailbox = "shop@example.com".parse().unwrap();
        let err = build_message(&from, "not-an-address", &message()).unwrap_err();
        assert!(matches!(err, NotifyError::Address(_)));
    }

    #[test]
    fn rejects_invalid_sender() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_owned(),
            port: 465,
            username: "shop@example.com".to_owned(),
            password: "secret".to_owned(),
            from: "not a mailbox".to_owned(),
        };
        assert!(matches!(
            SmtpMailer::new(&config, 5),
            Err(NotifyError::Address(_))
        ));
    }
}
