//! Field validation shared by the signup, login and tweet forms
//!
//! Errors are collected per field name so a form can be re-rendered with
//! every problem shown next to the input that caused it.

use email_address::EmailAddress;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "__all__";

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const TWEET_MAX_LENGTH: usize = 140;

pub mod messages {
    pub const REQUIRED: &str = "This field is required.";
    pub const INVALID_EMAIL: &str = "Enter a valid email address.";
    pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
    pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
    pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
    pub const PASSWORD_TOO_SHORT: &str =
        "This password is too short. It must contain at least 8 characters.";
    pub const PASSWORD_ENTIRELY_NUMERIC: &str = "This password is entirely numeric.";
    pub const PASSWORD_TOO_SIMILAR: &str = "The password is too similar to the username.";
    pub const PASSWORD_TOO_COMMON: &str = "This password is too common.";
    pub const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

    pub fn too_long(max: usize, actual: usize) -> String {
        format!(
            "Ensure this value has at most {} characters (it has {}).",
            max, actual
        )
    }
}

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid")
});

/// Validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an error set holding a single message.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Messages for one field, empty when the field is valid.
    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of every field carrying at least one message.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn non_field(&self) -> &[String] {
        self.get(NON_FIELD_ERRORS)
    }

    /// `Ok(())` when nothing was recorded, otherwise the collected errors.
    pub fn into_result(self) -> crate::Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Trim a text input and record a required-field error when nothing is left.
/// Returns the cleaned value when present.
pub fn required<'a>(errors: &mut ValidationErrors, field: &str, raw: &'a str) -> Option<&'a str> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, messages::REQUIRED);
        None
    } else {
        Some(value)
    }
}

/// Like `required`, but passwords keep surrounding whitespace.
pub fn required_untrimmed<'a>(
    errors: &mut ValidationErrors,
    field: &str,
    raw: &'a str,
) -> Option<&'a str> {
    if raw.is_empty() {
        errors.add(field, messages::REQUIRED);
        None
    } else {
        Some(raw)
    }
}

/// Record a length error when `value` has more than `max` characters.
pub fn max_length(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) -> bool {
    let len = value.chars().count();
    if len > max {
        errors.add(field, messages::too_long(max, len));
        false
    } else {
        true
    }
}

pub fn is_valid_username(value: &str) -> bool {
    USERNAME_RE.is_match(value)
}

/// Syntactic email check. The domain must either be `localhost` or carry a
/// dotted name; bare hosts like `user@example` are rejected.
pub fn is_valid_email(value: &str) -> bool {
    if !EmailAddress::is_valid(value) {
        return false;
    }
    match value.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && (domain.eq_ignore_ascii_case("localhost")
                    || (domain.contains('.')
                        && !domain.starts_with('.')
                        && !domain.ends_with('.')))
        }
        None => false,
    }
}
