//! Composable multi-field form validation.
//!
//! # Invariants
//! - Fields are checked in registration order.
//! - At most one error is reported per field; the first failing rule wins in
//!   the order required, email, min length, max length, custom.
//! - A missing field is validated as the empty string.

use super::rules::{is_required, is_valid_email};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

type CustomCheck = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Rule set for one form field.
#[derive(Default)]
pub struct FieldRule {
    pub required: bool,
    pub email: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    custom: Option<CustomCheck>,
    /// Message reported when the custom check fails.
    pub message: Option<String>,
}

impl Debug for FieldRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRule")
            .field("required", &self.required)
            .field("email", &self.email)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("custom", &self.custom.is_some())
            .field("message", &self.message)
            .finish()
    }
}

impl FieldRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn email(mut self) -> Self {
        self.email = true;
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Adds a custom predicate with the message reported on failure.
    pub fn custom(
        mut self,
        check: impl Fn(&str) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        self.custom = Some(Box::new(check));
        self.message = Some(message.into());
        self
    }

    fn check(&self, field: &str, value: &str) -> Option<String> {
        let len = value.chars().count();
        if self.required && !is_required(value) {
            return Some(format!("{field} is required"));
        }
        if self.email && !is_valid_email(value) {
            return Some("Invalid email format".to_string());
        }
        if let Some(min) = self.min_length.filter(|min| len < *min) {
            return Some(format!("Minimum length is {min}"));
        }
        if let Some(max) = self.max_length.filter(|max| len > *max) {
            return Some(format!("Maximum length is {max}"));
        }
        if let Some(check) = &self.custom {
            if !check(value) {
                return Some(
                    self.message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".to_string()),
                );
            }
        }
        None
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValidation {
    pub is_valid: bool,
    /// Field name to message.
    pub errors: BTreeMap<String, String>,
}

impl FormValidation {
    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }
}

/// Ordered collection of field rules.
#[derive(Debug, Default)]
pub struct FormValidator {
    rules: Vec<(String, FieldRule)>,
}

impl FormValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.push((name.into(), rule));
        self
    }

    pub fn validate(&self, form: &BTreeMap<String, String>) -> FormValidation {
        self.validate_with(|field| form.get(field).map(String::as_str))
    }

    /// Validates values supplied by an arbitrary lookup.
    pub fn validate_with<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> FormValidation {
        let errors = self
            .rules
            .iter()
            .filter_map(|(field, rule)| {
                let value = lookup(field).unwrap_or_default();
                rule.check(field, value)
                    .map(|message| (field.clone(), message))
            })
            .collect::<BTreeMap<_, _>>();

        FormValidation {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldRule, FormValidator};
    use std::collections::BTreeMap;

    fn form(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sign_up_validator() -> FormValidator {
        FormValidator::new()
            .field("email", FieldRule::new().required().email())
            .field("password", FieldRule::new().required().min_length(6))
            .field(
                "nickname",
                FieldRule::new()
                    .max_length(8)
                    .custom(|v| !v.contains(' '), "No spaces allowed"),
            )
    }

    #[test]
    fn valid_form_has_no_errors() {
        let result = sign_up_validator().validate(&form(&[
            ("email", "a@b.co"),
            ("password", "secret1"),
            ("nickname", "ada"),
        ]));
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn first_failing_rule_wins_per_field() {
        let result = sign_up_validator().validate(&form(&[
            ("email", ""),
            ("password", "abc"),
            ("nickname", "a b"),
        ]));
        assert!(!result.is_valid);
        assert_eq!(result.error_for("email"), Some("email is required"));
        assert_eq!(result.error_for("password"), Some("Minimum length is 6"));
        assert_eq!(result.error_for("nickname"), Some("No spaces allowed"));
    }

    #[test]
    fn missing_field_is_treated_as_empty() {
        let result = sign_up_validator().validate(&form(&[("email", "a@b.co")]));
        assert_eq!(result.error_for("password"), Some("password is required"));
        assert_eq!(result.error_for("nickname"), None);
    }

    #[test]
    fn max_length_reported_before_custom() {
        let result = sign_up_validator().validate(&form(&[
            ("email", "a@b.co"),
            ("password", "secret1"),
            ("nickname", "far too long"),
        ]));
        assert_eq!(result.error_for("nickname"), Some("Maximum length is 8"));
    }
}
