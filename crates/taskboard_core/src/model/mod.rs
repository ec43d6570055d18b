//! Domain records managed by core services.
//!
//! # Responsibility
//! - Define canonical data structures for tasks and user profiles.
//! - Keep field invariants next to the types that carry them.
//!
//! # Invariants
//! - Every task is scoped to exactly one owner identifier.
//! - Every profile is keyed by the identity subject id.

pub mod profile;
pub mod task;
