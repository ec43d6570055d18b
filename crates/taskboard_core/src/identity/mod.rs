//! Identity provider SPI.
//!
//! # Responsibility
//! - Define the contract the identity service uses to reach a hosted auth
//!   provider (credentials, OAuth popups, profile and credential mutation).
//! - Carry provider failures as raw string codes; mapping to user-facing
//!   errors happens in `service::identity_service`.
//!
//! # Invariants
//! - Providers hold at most one signed-in user at a time.
//! - Every provider call is synchronous request/response.

use crate::model::profile::AuthProvider;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod local;

pub use local::{FederatedAccount, LocalIdentityProvider};

/// Provider-side error codes understood by the identity service.
pub mod codes {
    pub const EMAIL_ALREADY_IN_USE: &str = "auth/email-already-in-use";
    pub const INVALID_EMAIL: &str = "auth/invalid-email";
    pub const OPERATION_NOT_ALLOWED: &str = "auth/operation-not-allowed";
    pub const WEAK_PASSWORD: &str = "auth/weak-password";
    pub const USER_DISABLED: &str = "auth/user-disabled";
    pub const USER_NOT_FOUND: &str = "auth/user-not-found";
    pub const WRONG_PASSWORD: &str = "auth/wrong-password";
    pub const TOO_MANY_REQUESTS: &str = "auth/too-many-requests";
    pub const NETWORK_REQUEST_FAILED: &str = "auth/network-request-failed";
    pub const POPUP_CLOSED_BY_USER: &str = "auth/popup-closed-by-user";
    pub const CANCELLED_POPUP_REQUEST: &str = "auth/cancelled-popup-request";
    pub const POPUP_BLOCKED: &str = "auth/popup-blocked";
    pub const ACCOUNT_EXISTS_WITH_DIFFERENT_CREDENTIAL: &str =
        "auth/account-exists-with-different-credential";
    pub const REQUIRES_RECENT_LOGIN: &str = "auth/requires-recent-login";
    pub const NO_CURRENT_USER: &str = "auth/no-current-user";
}

/// OAuth-style popup sign-in methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn auth_provider(self) -> AuthProvider {
        match self {
            Self::Google => AuthProvider::Google,
            Self::Github => AuthProvider::Github,
        }
    }
}

/// Identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUser {
    /// Stable subject id; owner identifier for tasks and profile key.
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub provider: AuthProvider,
}

/// Raw provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl Error for ProviderError {}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Hosted identity API used by the identity service.
pub trait IdentityProvider: Send + Sync {
    /// Creates an email/password credential and signs it in.
    fn create_user_with_email(&self, email: &str, password: &str) -> ProviderResult<ProviderUser>;
    fn sign_in_with_email(&self, email: &str, password: &str) -> ProviderResult<ProviderUser>;
    fn sign_in_with_popup(&self, provider: OAuthProvider) -> ProviderResult<ProviderUser>;
    fn sign_out(&self) -> ProviderResult<()>;
    fn current_user(&self) -> Option<ProviderUser>;
    fn send_password_reset_email(&self, email: &str) -> ProviderResult<()>;
    /// Updates display name and avatar of the signed-in user.
    fn update_profile(
        &self,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> ProviderResult<ProviderUser>;
    fn update_email(&self, email: &str) -> ProviderResult<ProviderUser>;
    fn update_password(&self, password: &str) -> ProviderResult<()>;
    /// Confirms the signed-in user's password for sensitive operations.
    fn reauthenticate(&self, password: &str) -> ProviderResult<ProviderUser>;
    /// Removes the signed-in identity and signs out.
    fn delete_current_user(&self) -> ProviderResult<()>;
}
