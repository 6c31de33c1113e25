// ABOUTME: Input validation rules and conversion of validator errors into field error maps
// ABOUTME: Password, username and email rules shared by every account request type
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::borrow::Cow;
use std::sync::LazyLock;

use account_core::constants::limits;
use account_core::errors::{AppError, AppResult, FieldErrors};
use regex::Regex;
use validator::{Validate, ValidationError, ValidationErrors};

static USERNAME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").ok());

/// Validate a request, mapping failures to `VALIDATION_FAILED` with per-field messages
///
/// # Errors
///
/// Returns a validation error listing every failing field
pub fn validate_request<T: Validate>(request: &T) -> AppResult<()> {
    request
        .validate()
        .map_err(|errors| AppError::validation(field_errors(&errors)))
}

/// Flatten `ValidationErrors` into camelCase field names and messages
#[must_use]
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map_or_else(|| format!("Invalid value for {field}"), ToString::to_string)
                })
                .collect();
            (to_camel_case(&field), messages)
        })
        .collect()
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Canonical form of an email address: trimmed and lower-cased
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Password strength: 8 to 72 bytes with at least one letter and one digit
///
/// # Errors
///
/// Returns the first rule the password breaks
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if (password.len() as u64) < limits::PASSWORD_MIN_LENGTH {
        return Err(error("password_length", "Password must be at least 8 characters"));
    }
    if (password.len() as u64) > limits::PASSWORD_MAX_LENGTH {
        return Err(error("password_length", "Password must be at most 72 characters"));
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err(error(
            "password_letter",
            "Password must contain at least one letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(error(
            "password_digit",
            "Password must contain at least one number",
        ));
    }
    Ok(())
}

/// Username: 3 to 30 characters of letters, digits and underscores
///
/// # Errors
///
/// Returns the first rule the username breaks
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count() as u64;
    if !(limits::USERNAME_MIN_LENGTH..=limits::USERNAME_MAX_LENGTH).contains(&len) {
        return Err(error(
            "username_length",
            "Username must be between 3 and 30 characters",
        ));
    }
    let valid = USERNAME_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(username));
    if !valid {
        return Err(error(
            "username_chars",
            "Username may only contain letters, numbers and underscores",
        ));
    }
    Ok(())
}

/// Display name: not blank once trimmed
///
/// # Errors
///
/// Returns an error for a whitespace-only name
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(error("name_blank", "Name cannot be blank"));
    }
    Ok(())
}

/// Avatar URL: absolute http(s) URL
///
/// # Errors
///
/// Returns an error for anything that is not an http(s) URL
pub fn validate_image_url(image: &str) -> Result<(), ValidationError> {
    match url::Url::parse(image) {
        Ok(url) if url.scheme() == "https" || url.scheme() == "http" => Ok(()),
        _ => Err(error("image_url", "Image must be an http(s) URL")),
    }
}

/// Deletion confirmation must be the literal `DELETE`
///
/// # Errors
///
/// Returns an error for any other text
pub fn validate_delete_confirmation(confirmation: &str) -> Result<(), ValidationError> {
    if confirmation == account_core::constants::lifecycle::DELETE_CONFIRMATION {
        Ok(())
    } else {
        Err(error("confirmation", "Type DELETE to confirm"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Signup {
        #[validate(email(message = "Invalid email address"))]
        email: String,
        #[validate(custom(function = "validate_password"))]
        new_password: String,
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("abcdefg1").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("allletters").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password(&format!("a{}", "1".repeat(72))).is_err());
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("jane_doe42").is_ok());
        assert!(validate_username("jd").is_err());
        assert!(validate_username("jane doe").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
    }

    #[test]
    fn test_image_url_rules() {
        assert!(validate_image_url("https://cdn.example.com/a.png").is_ok());
        assert!(validate_image_url("javascript:alert(1)").is_err());
        assert!(validate_image_url("not a url").is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Jane.Doe@Example.COM "),
            "jane.doe@example.com"
        );
    }

    #[test]
    fn test_validate_request_collects_camel_case_fields() {
        let request = Signup {
            email: "nope".into(),
            new_password: "short".into(),
        };
        let err = validate_request(&request).unwrap_err();
        assert_eq!(err.code, account_core::errors::ErrorCode::ValidationFailed);
        assert_eq!(err.field_errors["email"], vec!["Invalid email address"]);
        assert_eq!(
            err.field_errors["newPassword"],
            vec!["Password must be at least 8 characters"]
        );
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("current_password"), "currentPassword");
        assert_eq!(to_camel_case("email"), "email");
    }
}
