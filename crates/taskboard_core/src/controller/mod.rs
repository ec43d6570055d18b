//! Presentation controllers.
//!
//! # Responsibility
//! - Hold page state for the sign-in page and the dashboard.
//! - Run client-side validation before any service call.
//! - Turn every outcome into view data or a transient [`Notification`].
//!
//! # Invariants
//! - Controllers never panic and never return errors; failures surface as
//!   error notifications or inline form errors.

pub mod auth_controller;
pub mod dashboard_controller;
pub mod notification;

pub use auth_controller::{AuthController, AuthTab, SignInForm, SignUpForm};
pub use dashboard_controller::{DashboardController, StatusFilter, TaskForm, TaskRow};
pub use notification::{Notification, NotificationKind};

/// Page a controller asks the host to navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    Dashboard,
}
