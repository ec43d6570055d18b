//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate validation, ownership checks and repository calls into
//!   use-case level APIs.
//! - Turn every failure into one human-readable message via `Display`.
//! - Keep controllers decoupled from storage and provider details.

pub mod identity_service;
pub mod profile_service;
pub mod task_service;
