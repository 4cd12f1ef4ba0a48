//! Input validation helpers shared by the services.

use std::collections::BTreeMap;

use serde::Serialize;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Per-field validation messages, keyed by field path (e.g.
/// `"ticket_types[0].price"`). Rendered in the `details` of a 400 response
/// so forms can attach each message to its input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for `field`. The first message per field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Returns `true` if no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the message recorded for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Number of failed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Trims and lowercases an email address.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Structural email check: one `@`, non-empty local part, dotted domain.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Nigerian NUBAN account numbers are exactly ten digits.
#[must_use]
pub fn is_valid_account_number(account_number: &str) -> bool {
    account_number.len() == 10 && account_number.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.add("title", "title is required");
        errors.add("title", "title is too long");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("title"), Some("title is required"));
    }

    #[test]
    fn serializes_as_flat_object() {
        let mut errors = FieldErrors::new();
        errors.add("venue", "venue is required");
        let json = serde_json::to_value(&errors).unwrap_or_default();
        assert_eq!(json["venue"], "venue is required");
    }

    #[test]
    fn email_rules() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada@@example.com"));
        assert!(!is_valid_email("a da@example.com"));
    }

    #[test]
    fn account_number_rules() {
        assert!(is_valid_account_number("0123456789"));
        assert!(!is_valid_account_number("012345678"));
        assert!(!is_valid_account_number("01234567ab"));
    }
}
