//! Field-level predicates for user-entered values.
//!
//! # Invariants
//! - Every function is pure and total: no I/O, no panics, no errors.
//! - Lengths are measured in Unicode scalar values, not bytes.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub const PASSWORD_MIN_CHARS: usize = 6;
pub const STRONG_PASSWORD_MIN_CHARS: usize = 8;
pub const TASK_TITLE_MAX_CHARS: usize = 200;
pub const TASK_DESCRIPTION_MAX_CHARS: usize = 1000;
pub const DISPLAY_NAME_MIN_CHARS: usize = 2;
pub const DISPLAY_NAME_MAX_CHARS: usize = 50;

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const NAIVE_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Minimum provider policy: at least 6 characters.
pub fn is_valid_password(value: &str) -> bool {
    char_len(value) >= PASSWORD_MIN_CHARS
}

/// 8+ characters with at least one lowercase, one uppercase and one digit.
pub fn is_strong_password(value: &str) -> bool {
    char_len(value) >= STRONG_PASSWORD_MIN_CHARS
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
}

pub fn is_required(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn is_valid_length(value: &str, min: usize, max: usize) -> bool {
    let len = char_len(value);
    len >= min && len <= max
}

pub fn is_valid_task_title(value: &str) -> bool {
    is_required(value) && is_valid_length(value, 1, TASK_TITLE_MAX_CHARS)
}

/// Blank descriptions are accepted because the field is optional.
pub fn is_valid_task_description(value: &str) -> bool {
    if value.trim().is_empty() {
        return true;
    }
    is_valid_length(value, 0, TASK_DESCRIPTION_MAX_CHARS)
}

pub fn is_valid_display_name(value: &str) -> bool {
    is_required(value) && is_valid_length(value, DISPLAY_NAME_MIN_CHARS, DISPLAY_NAME_MAX_CHARS)
}

pub fn is_valid_priority(value: &str) -> bool {
    matches!(value, "low" | "medium" | "high")
}

pub fn is_valid_status(value: &str) -> bool {
    matches!(value, "pending" | "completed")
}

/// Blank input is valid (the due date is optional).
pub fn is_valid_date(value: &str) -> bool {
    value.trim().is_empty() || parse_due_date(value).is_some()
}

/// Parses a due date into epoch milliseconds.
///
/// Accepts RFC 3339, HTML `datetime-local` (`YYYY-MM-DDTHH:MM`) and plain
/// `YYYY-MM-DD`. Inputs without an offset are read as UTC.
pub fn parse_due_date(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.timestamp_millis());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(trimmed, NAIVE_DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
}

/// Returns the first failing message for a known form field.
///
/// Unknown fields and valid values return `None`.
pub fn field_error_message(field: &str, value: &str) -> Option<&'static str> {
    match field {
        "email" => {
            if !is_required(value) {
                Some("Email is required")
            } else if !is_valid_email(value) {
                Some("Invalid email format")
            } else {
                None
            }
        }
        "password" => {
            if !is_required(value) {
                Some("Password is required")
            } else if !is_valid_password(value) {
                Some("Password must be at least 6 characters")
            } else {
                None
            }
        }
        "name" => {
            if !is_required(value) {
                Some("Name is required")
            } else if !is_valid_length(value, DISPLAY_NAME_MIN_CHARS, DISPLAY_NAME_MAX_CHARS) {
                Some("Name must be 2-50 characters")
            } else {
                None
            }
        }
        "title" => {
            if !is_required(value) {
                Some("Title is required")
            } else if !is_valid_length(value, 1, TASK_TITLE_MAX_CHARS) {
                Some("Title must be 1-200 characters")
            } else {
                None
            }
        }
        "description" => (!is_valid_task_description(value))
            .then_some("Description must be less than 1000 characters"),
        _ => None,
    }
}

/// Escapes text for safe interpolation into HTML.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}
