use thiserror::Error;

/// Errors returned by the email and WhatsApp notifiers.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The messaging provider answered with a non-success status.
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The SMTP server rejected the message or could not be reached.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// A sender or recipient address could not be parsed, or the message
    /// could not be assembled.
    #[error("invalid email message: {0}")]
    Address(String),

    /// The channel has no credentials configured.
    #[error("{0} notifications are not configured")]
    NotConfigured(&'static str),
}
