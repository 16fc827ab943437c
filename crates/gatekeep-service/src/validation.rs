//! Input rules for registration, login and administration.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 64;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .unwrap_or_else(|e| panic!("email pattern: {e}"))
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9][0-9 \-]{5,19}$").unwrap_or_else(|e| panic!("phone pattern: {e}"))
});

static ROLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_\-]*$").unwrap_or_else(|e| panic!("role pattern: {e}"))
});

/// A rejected input field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub fn email(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new("email", "is required"));
    }
    if !EMAIL.is_match(value) {
        return Err(ValidationError::new("email", "is not a valid address"));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

pub fn username(value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len < MIN_USERNAME_LEN {
        return Err(ValidationError::new(
            "username",
            format!("must be at least {MIN_USERNAME_LEN} characters"),
        ));
    }
    if len > MAX_NAME_LEN {
        return Err(ValidationError::new(
            "username",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(())
}

/// Phone is optional; an empty string counts as absent.
pub fn phone(value: Option<&str>) -> Result<(), ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(()),
        Some(number) if PHONE.is_match(number) => Ok(()),
        Some(_) => Err(ValidationError::new("phone", "is not a valid number")),
    }
}

pub fn role_name(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.len() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            "role name",
            format!("must be 1 to {MAX_NAME_LEN} characters"),
        ));
    }
    if !ROLE_NAME.is_match(value) {
        return Err(ValidationError::new(
            "role name",
            "must start with a letter and contain only letters, digits, '_' or '-'",
        ));
    }
    Ok(())
}

pub fn permission_name(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() || value.len() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            "permission name",
            format!("must be 1 to {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_rules() {
        assert!(email("alice@example.com").is_ok());
        assert!(email("a.b+tag@mail.example.co").is_ok());
        for bad in ["", "alice", "alice@", "@example.com", "alice@example", "a b@example.com"] {
            assert_eq!(email(bad).unwrap_err().field, "email", "{bad:?}");
        }
    }

    #[test]
    fn test_password_and_username_lengths() {
        assert!(password("12345678").is_ok());
        assert!(password("1234567").is_err());
        assert!(username("bob").is_ok());
        assert!(username("bo").is_err());
        assert!(username("  bo  ").is_err());
        assert!(username(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_phone_is_optional() {
        assert!(phone(None).is_ok());
        assert!(phone(Some("")).is_ok());
        assert!(phone(Some("+886 912-345-678")).is_ok());
        assert!(phone(Some("call me")).is_err());
    }

    #[test]
    fn test_role_and_permission_names() {
        assert!(role_name("editor").is_ok());
        assert!(role_name("order-desk_2").is_ok());
        assert!(role_name("").is_err());
        assert!(role_name("2fast").is_err());
        assert!(role_name("has space").is_err());
        assert!(permission_name("update products").is_ok());
        assert!(permission_name("   ").is_err());
    }

    #[test]
    fn test_error_message_names_field() {
        let err = password("short").unwrap_err();
        assert_eq!(err.to_string(), "invalid password: must be at least 8 characters");
    }
}
