//! WhatsApp messages through the Twilio Messages REST API.
//!
//! Without credentials the client runs in log-only mode: every message is
//! written to the trace log and reported as [`Delivery::Logged`].

use std::time::Duration;

use butcher_core::TwilioConfig;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::NotifyError;
use crate::phone::format_lebanese_number;
use crate::retry::retry_with_backoff;

const DEFAULT_BASE_URL: &str = "https://api.twilio.com/";
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Outcome of a WhatsApp send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted by the provider; carries the provider's message id.
    Sent { sid: String },
    /// No credentials configured; the message was only logged.
    Logged,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

/// Client for sending WhatsApp messages.
///
/// Use [`WhatsAppClient::new`] for production or
/// [`WhatsAppClient::with_base_url`] to point at a mock server in tests.
pub struct WhatsAppClient {
    client: Client,
    base_url: Url,
    credentials: Option<TwilioConfig>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl WhatsAppClient {
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        credentials: Option<TwilioConfig>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, NotifyError> {
        Self::with_base_url(credentials, timeout_secs, max_retries, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`NotifyError::Api`] if `base_url` is not a
    /// valid URL.
    pub fn with_base_url(
        credentials: Option<TwilioConfig>,
        timeout_secs: u64,
        max_retries: u32,
        base_url: &str,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("butcher-shop/0.1 (order-notifications)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| NotifyError::Api {
            status: 0,
            message: format!("invalid base URL '{base_url}': {e}"),
        })?;

        Ok(Self {
            client,
            base_url,
            credentials,
            max_retries,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    /// Overrides the first back-off delay. Tests pass `0`.
    #[must_use]
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Sends `body` to `to`, normalizing the number to Lebanese international form.
    ///
    /// # Errors
    ///
    /// - [`NotifyError::Api`] if Twilio rejects the message.
    /// - [`NotifyError::Http`] on network failure after retries.
    pub async fn send(&self, to: &str, body: &str) -> Result<Delivery, NotifyError> {
        let recipient = format_lebanese_number(to);

        let Some(credentials) = &self.credentials else {
            tracing::info!(to = %recipient, body, "WhatsApp not configured; message logged");
            return Ok(Delivery::Logged);
        };

        let url = self
            .base_url
            .join(&format!(
                "2010-04-01/Accounts/{}/Messages.json",
                credentials.account_sid
            ))
            .map_err(|e| NotifyError::Api {
                status: 0,
                message: format!("invalid account sid: {e}"),
            })?;

        let from = whatsapp_address(&credentials.whatsapp_from);
        let to_address = whatsapp_address(&recipient);
        tracing::debug!(to = %recipient, "sending WhatsApp message");

        let sid = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.post_message(&url, credentials, &from, &to_address, body)
        })
        .await?;

        tracing::info!(to = %recipient, %sid, "WhatsApp message sent");
        Ok(Delivery::Sent { sid })
    }

    async fn post_message(
        &self,
        url: &Url,
        credentials: &TwilioConfig,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<String, NotifyError> {
        let response = self
            .client
            .post(url.clone())
            .basic_auth(&credentials.account_sid, Some(&credentials.auth_token))
            .form(&[("From", from), ("To", to), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(text);
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessageResponse = response.json().await?;
        Ok(parsed.sid)
    }
}

fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_owned()
    } else {
        format!("whatsapp:{number}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whatsapp_prefix_is_added_once() {
        assert_eq!(whatsapp_address("+96170123456"), "whatsapp:+96170123456");
        assert_eq!(
            whatsapp_address("whatsapp:+96170123456"),
            "whatsapp:+96170123456"
        );
    }

    #[tokio::test]
    async fn unconfigured_client_logs_instead_of_sending() {
        let client = WhatsAppClient::new(None, 5, 0).expect("client construction should not fail");
        assert!(!client.is_configured());
        let delivery = client.send("70123456", "hello").await.unwrap();
        assert_eq!(delivery, Delivery::Logged);
    }
}
