//! Phone number validation and normalization.

use std::sync::LazyLock;

use regex::Regex;

/// E.164-ish shape: optional `+`, a non-zero leading digit, 2-15 digits.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").unwrap());

static NON_DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\d+]").unwrap());

/// Strip formatting characters and validate the result.
///
/// Returns the normalized number or an error message suitable for a 400
/// response.
pub fn normalize(phone_number: &str) -> Result<String, &'static str> {
    let cleaned = NON_DIGIT_RE.replace_all(phone_number, "").into_owned();
    if PHONE_RE.is_match(&cleaned) {
        Ok(cleaned)
    } else {
        Err("Invalid phone number format")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_e164() {
        assert_eq!(normalize("+15551234567").unwrap(), "+15551234567");
        assert_eq!(normalize("447700900123").unwrap(), "447700900123");
    }

    #[test]
    fn test_strips_formatting() {
        assert_eq!(normalize("+1 (555) 123-4567").unwrap(), "+15551234567");
        assert_eq!(normalize("555.123.4567").unwrap(), "5551234567");
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(normalize("").is_err());
        assert!(normalize("0123456").is_err());
        assert!(normalize("+").is_err());
        assert!(normalize("not-a-number").is_err());
    }
}
