//! Lebanese mobile numbers in the international form WhatsApp expects.

/// Normalize a Lebanese phone number to `+961XXXXXXXX`.
///
/// Non-digits are stripped first. Numbers already carrying the `961` country
/// code get a leading `+`; a local trunk `0` is replaced by `+961`; a bare
/// 8-digit local number is prefixed with `+961`. Anything else is returned
/// unchanged.
#[must_use]
pub fn format_lebanese_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.starts_with("961") {
        format!("+{digits}")
    } else if let Some(local) = digits.strip_prefix('0') {
        format!("+961{local}")
    } else if digits.len() == 8 {
        format!("+961{digits}")
    } else {
        raw.to_owned()
    }
}
