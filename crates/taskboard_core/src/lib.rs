//! Core domain logic for Taskboard, a per-user to-do list.
//! This crate owns validation, storage, identity and the page controllers.

pub mod app;
pub mod config;
pub mod controller;
pub mod db;
pub mod identity;
pub mod live;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod validation;

pub use app::AppContext;
pub use config::{AppConfig, BackendConfig, ConfigError};
pub use identity::{IdentityProvider, LocalIdentityProvider, ProviderUser};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::profile::{AuthProvider, UserProfile};
pub use model::task::{Task, TaskFilter, TaskId, TaskPriority, TaskStatus};
pub use repo::{RepoError, RepoResult};
pub use service::identity_service::{AuthError, IdentityService};
pub use service::profile_service::{ProfileService, ProfileServiceError, ProfileStats};
pub use service::task_service::{TaskService, TaskServiceError, TaskStats};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
