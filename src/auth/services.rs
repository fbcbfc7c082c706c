use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.len() <= 100 && EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Trims, lower-cases and checks an email from a request body.
pub(crate) fn require_email(raw: Option<&str>) -> Result<String, ApiError> {
    let email = normalize_email(raw.unwrap_or_default());
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Please provide a valid email address"));
    }
    Ok(email)
}

pub(crate) fn require_new_password(raw: Option<&str>) -> Result<String, ApiError> {
    let password = raw.unwrap_or_default();
    if password.trim().is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(password.to_string())
}

pub(crate) fn validate_username(raw: &str) -> Result<String, ApiError> {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap();
    }
    let username = raw.trim();
    let len = username.chars().count();
    if len < USERNAME_MIN || len > USERNAME_MAX {
        return Err(ApiError::validation(format!(
            "Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"
        )));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ApiError::validation(
            "Username may only contain letters, numbers, dots, dashes and underscores",
        ));
    }
    Ok(username.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  A@X.Com \n"), "a@x.com");
        assert_eq!(require_email(Some(" A@X.com ")).unwrap(), "a@x.com");
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
        assert!(require_email(None).is_err());
        assert!(require_email(Some("   ")).is_err());
    }

    #[test]
    fn password_rules() {
        assert!(require_new_password(Some("pw123456")).is_ok());
        assert!(require_new_password(Some("short")).is_err());
        assert!(require_new_password(Some("        ")).is_err());
        assert!(require_new_password(None).is_err());
    }

    #[test]
    fn username_bounds() {
        assert!(validate_username("ab").is_err());
        assert_eq!(validate_username("  abc ").unwrap(), "abc");
        assert!(validate_username(&"a".repeat(30)).is_ok());
        assert!(validate_username(&"a".repeat(31)).is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("o'neil").is_err());
    }
}
