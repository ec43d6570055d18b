//! Input validation for user-entered fields.
//!
//! # Responsibility
//! - Provide pure predicates for emails, passwords, names and task fields.
//! - Compose per-field rules into a single pass/fail result with messages.
//!
//! # Invariants
//! - Nothing in this module performs I/O or returns `Err`.

pub mod form;
pub mod rules;
