//! Input checks applied by the HTTP layer before anything reaches storage.

use thiserror::Error;

const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-={}[]|;:'\",.<>/?";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("password must be 8+ characters with a number and a symbol")]
    WeakPassword,

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
}

/// Require at least eight characters, one ASCII digit and one symbol.
///
/// # Errors
///
/// Returns [`ValidationError::WeakPassword`] when any rule fails.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= PASSWORD_MIN_LEN;
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));

    if long_enough && has_digit && has_symbol {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword)
    }
}

/// Trim and lowercase an email address, checking its basic shape.
///
/// # Errors
///
/// Returns [`ValidationError::Required`] for blank input or
/// [`ValidationError::InvalidEmail`] when the `local@domain` shape is wrong.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::Required("email"));
    }

    let mut parts = email.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    let well_formed = parts.next().is_none()
        && !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace);

    if well_formed {
        Ok(email)
    } else {
        Err(ValidationError::InvalidEmail(raw.trim().to_owned()))
    }
}

/// Trim a required text field and enforce a maximum length in characters.
///
/// # Errors
///
/// Returns [`ValidationError::Required`] for blank input or
/// [`ValidationError::TooLong`] above `max`.
pub fn require_text(field: &'static str, raw: &str, max: usize) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Required(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value.to_owned())
}

/// Like [`require_text`], but blank input yields `None`.
///
/// # Errors
///
/// Returns [`ValidationError::TooLong`] above `max`.
pub fn optional_text(
    field: &'static str,
    raw: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        Some(value) => Ok(Some(value.to_owned())),
    }
}
