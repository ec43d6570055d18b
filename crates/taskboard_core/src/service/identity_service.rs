//! Identity use-case service.
//!
//! # Responsibility
//! - Wrap provider sign-up, sign-in, sign-out and credential mutation.
//! - Normalize provider error codes into tagged, user-facing errors.
//! - Create the profile record lazily on the first successful sign-in.
//! - Publish auth-state snapshots to live subscribers.
//!
//! # Invariants
//! - A successful sign-in leaves exactly one profile for the signed-in uid.
//! - Account deletion removes the profile before the identity and leaves the
//!   user's tasks in place.

use crate::identity::{codes, IdentityProvider, OAuthProvider, ProviderError, ProviderUser};
use crate::live::{LiveQueryHub, LiveSubscription};
use crate::model::profile::{fallback_display_name, AuthProvider, NewProfile, ProfilePatch};
use crate::repo::profile_repo::ProfileRepository;
use crate::repo::task_repo::TaskRepository;
use crate::service::profile_service::{ProfileService, ProfileServiceError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type AuthResult<T> = Result<T, AuthError>;

/// Live-query registry for auth state.
pub type AuthHub = LiveQueryHub<(), Option<ProviderUser>>;
/// Stream of auth states; `None` while signed out.
pub type AuthSubscription = LiveSubscription<Option<ProviderUser>>;

const UNKNOWN_AUTH_ERROR_MESSAGE: &str = "An error occurred during authentication";

/// Authentication failure, one variant per known provider failure mode.
#[derive(Debug)]
pub enum AuthError {
    EmailAlreadyInUse,
    InvalidEmail,
    OperationNotAllowed,
    WeakPassword,
    UserDisabled,
    UserNotFound,
    WrongPassword,
    TooManyRequests,
    NetworkRequestFailed,
    PopupClosedByUser,
    CancelledPopupRequest,
    PopupBlocked,
    AccountExistsWithDifferentCredential,
    RequiresRecentLogin,
    NoUserLoggedIn,
    Profile(ProfileServiceError),
    /// Unmapped provider failure carrying the provider's raw message.
    Unknown(String),
}

impl AuthError {
    /// Maps a raw provider code; unmapped codes keep the raw message.
    pub fn from_provider(err: ProviderError) -> Self {
        match err.code.as_str() {
            codes::EMAIL_ALREADY_IN_USE => Self::EmailAlreadyInUse,
            codes::INVALID_EMAIL => Self::InvalidEmail,
            codes::OPERATION_NOT_ALLOWED => Self::OperationNotAllowed,
            codes::WEAK_PASSWORD => Self::WeakPassword,
            codes::USER_DISABLED => Self::UserDisabled,
            codes::USER_NOT_FOUND => Self::UserNotFound,
            codes::WRONG_PASSWORD => Self::WrongPassword,
            codes::TOO_MANY_REQUESTS => Self::TooManyRequests,
            codes::NETWORK_REQUEST_FAILED => Self::NetworkRequestFailed,
            codes::POPUP_CLOSED_BY_USER => Self::PopupClosedByUser,
            codes::CANCELLED_POPUP_REQUEST => Self::CancelledPopupRequest,
            codes::POPUP_BLOCKED => Self::PopupBlocked,
            codes::ACCOUNT_EXISTS_WITH_DIFFERENT_CREDENTIAL => {
                Self::AccountExistsWithDifferentCredential
            }
            codes::REQUIRES_RECENT_LOGIN => Self::RequiresRecentLogin,
            codes::NO_CURRENT_USER => Self::NoUserLoggedIn,
            _ => Self::Unknown(err.message),
        }
    }

    /// Stable identifier for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmailAlreadyInUse => "email_already_in_use",
            Self::InvalidEmail => "invalid_email",
            Self::OperationNotAllowed => "operation_not_allowed",
            Self::WeakPassword => "weak_password",
            Self::UserDisabled => "user_disabled",
            Self::UserNotFound => "user_not_found",
            Self::WrongPassword => "wrong_password",
            Self::TooManyRequests => "too_many_requests",
            Self::NetworkRequestFailed => "network_request_failed",
            Self::PopupClosedByUser => "popup_closed_by_user",
            Self::CancelledPopupRequest => "cancelled_popup_request",
            Self::PopupBlocked => "popup_blocked",
            Self::AccountExistsWithDifferentCredential => "account_exists_with_different_credential",
            Self::RequiresRecentLogin => "requires_recent_login",
            Self::NoUserLoggedIn => "no_user_logged_in",
            Self::Profile(_) => "profile_failed",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmailAlreadyInUse => write!(f, "This email is already registered"),
            Self::InvalidEmail => write!(f, "Invalid email address"),
            Self::OperationNotAllowed => write!(f, "Operation not allowed"),
            Self::WeakPassword => write!(f, "Password is too weak (minimum 6 characters)"),
            Self::UserDisabled => write!(f, "This account has been disabled"),
            Self::UserNotFound => write!(f, "No account found with this email"),
            Self::WrongPassword => write!(f, "Incorrect password"),
            Self::TooManyRequests => {
                write!(f, "Too many failed attempts. Please try again later")
            }
            Self::NetworkRequestFailed => {
                write!(f, "Network error. Please check your connection")
            }
            Self::PopupClosedByUser => write!(f, "Sign-in popup was closed"),
            Self::CancelledPopupRequest => {
                write!(f, "Only one popup request is allowed at a time")
            }
            Self::PopupBlocked => write!(f, "Sign-in popup was blocked by the browser"),
            Self::AccountExistsWithDifferentCredential => write!(
                f,
                "An account already exists with the same email but different sign-in credentials"
            ),
            Self::RequiresRecentLogin => write!(
                f,
                "This operation requires recent authentication. Please log in again"
            ),
            Self::NoUserLoggedIn => write!(f, "No user logged in"),
            Self::Profile(err) => write!(f, "{err}"),
            Self::Unknown(message) if message.trim().is_empty() => {
                f.write_str(UNKNOWN_AUTH_ERROR_MESSAGE)
            }
            Self::Unknown(message) => f.write_str(message),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Profile(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(value: ProviderError) -> Self {
        Self::from_provider(value)
    }
}

impl From<ProfileServiceError> for AuthError {
    fn from(value: ProfileServiceError) -> Self {
        Self::Profile(value)
    }
}

/// Identity facade over a provider and the profile service.
pub struct IdentityService<P: ProfileRepository, T: TaskRepository> {
    provider: Arc<dyn IdentityProvider>,
    profiles: ProfileService<P, T>,
    hub: Arc<AuthHub>,
}

impl<P: ProfileRepository, T: TaskRepository> IdentityService<P, T> {
    pub fn new(provider: Arc<dyn IdentityProvider>, profiles: ProfileService<P, T>) -> Self {
        Self::with_hub(provider, profiles, AuthHub::new("auth"))
    }

    pub fn with_hub(
        provider: Arc<dyn IdentityProvider>,
        profiles: ProfileService<P, T>,
        hub: Arc<AuthHub>,
    ) -> Self {
        Self {
            provider,
            profiles,
            hub,
        }
    }

    pub fn profiles(&self) -> &ProfileService<P, T> {
        &self.profiles
    }

    /// Creates an email/password identity with a display name and profile.
    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<ProviderUser> {
        let result = self.sign_up_inner(email, password, display_name);
        self.finish("sign_up", result)
    }

    fn sign_up_inner(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<ProviderUser> {
        self.provider.create_user_with_email(email, password)?;
        let user = self.provider.update_profile(Some(display_name), None)?;
        self.profiles.create_profile(NewProfile {
            uid: user.uid.clone(),
            name: display_name.to_string(),
            email: user.email.clone(),
            photo_url: user.photo_url.clone(),
            provider: AuthProvider::Email,
        })?;
        Ok(user)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> AuthResult<ProviderUser> {
        let result = self
            .provider
            .sign_in_with_email(email, password)
            .map_err(AuthError::from)
            .and_then(|user| self.ensure_profile(user));
        self.finish("sign_in", result)
    }

    pub fn sign_in_with_google(&self) -> AuthResult<ProviderUser> {
        self.sign_in_with_popup(OAuthProvider::Google)
    }

    pub fn sign_in_with_github(&self) -> AuthResult<ProviderUser> {
        self.sign_in_with_popup(OAuthProvider::Github)
    }

    fn sign_in_with_popup(&self, provider: OAuthProvider) -> AuthResult<ProviderUser> {
        let result = self
            .provider
            .sign_in_with_popup(provider)
            .map_err(AuthError::from)
            .and_then(|user| self.ensure_profile(user));
        self.finish("sign_in_popup", result)
    }

    pub fn sign_out(&self) -> AuthResult<()> {
        let result = self.provider.sign_out().map_err(AuthError::from);
        self.finish("sign_out", result)
    }

    pub fn send_password_reset(&self, email: &str) -> AuthResult<()> {
        self.provider.send_password_reset_email(email)?;
        info!("event=auth_password_reset module=identity_service status=ok");
        Ok(())
    }

    /// Updates display name and avatar on the provider and the profile.
    pub fn update_profile(
        &self,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> AuthResult<ProviderUser> {
        let result = self.update_profile_inner(display_name, photo_url);
        self.finish("update_profile", result)
    }

    fn update_profile_inner(
        &self,
        display_name: &str,
        photo_url: Option<&str>,
    ) -> AuthResult<ProviderUser> {
        let current = self.require_user()?;
        let user = self.provider.update_profile(Some(display_name), photo_url)?;
        self.profiles.update_profile(
            &current.uid,
            &ProfilePatch {
                name: Some(display_name.to_string()),
                photo_url: photo_url.map(|url| Some(url.to_string())),
                ..ProfilePatch::default()
            },
        )?;
        Ok(user)
    }

    pub fn update_email(&self, email: &str) -> AuthResult<ProviderUser> {
        let result = self.require_user().and_then(|current| {
            let user = self.provider.update_email(email)?;
            self.profiles.update_profile(
                &current.uid,
                &ProfilePatch {
                    email: Some(user.email.clone()),
                    ..ProfilePatch::default()
                },
            )?;
            Ok(user)
        });
        self.finish("update_email", result)
    }

    pub fn update_password(&self, password: &str) -> AuthResult<()> {
        self.require_user()?;
        self.provider.update_password(password)?;
        Ok(())
    }

    /// Re-confirms the password before a sensitive operation.
    pub fn reauthenticate(&self, password: &str) -> AuthResult<ProviderUser> {
        self.require_user()?;
        Ok(self.provider.reauthenticate(password)?)
    }

    /// Deletes the profile record, then the identity.
    ///
    /// Tasks owned by the identity are left in the store. If the provider
    /// rejects the deletion (for example `requires-recent-login`), the
    /// profile is written back and the session is kept.
    pub fn delete_account(&self) -> AuthResult<()> {
        let result = self.require_user().and_then(|current| {
            let stored = self.profiles.get_profile(&current.uid)?;
            self.profiles.delete_profile(&current.uid)?;
            if let Err(err) = self.provider.delete_current_user() {
                if let Some(profile) = stored {
                    self.profiles.create_profile(NewProfile::from(profile))?;
                }
                return Err(err.into());
            }
            Ok(())
        });
        self.finish("delete_account", result)
    }

    pub fn current_user(&self) -> Option<ProviderUser> {
        self.provider.current_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    /// Live auth state: the current user immediately, then every change
    /// made through services sharing this hub.
    pub fn subscribe_auth_changes(&self) -> AuthSubscription {
        self.hub.register((), self.current_user())
    }

    fn require_user(&self) -> AuthResult<ProviderUser> {
        self.current_user().ok_or(AuthError::NoUserLoggedIn)
    }

    fn ensure_profile(&self, user: ProviderUser) -> AuthResult<ProviderUser> {
        if self.profiles.profile_exists(&user.uid)? {
            return Ok(user);
        }
        self.profiles.create_profile(NewProfile {
            uid: user.uid.clone(),
            name: fallback_display_name(user.display_name.as_deref(), &user.email),
            email: user.email.clone(),
            photo_url: user.photo_url.clone(),
            provider: user.provider,
        })?;
        Ok(user)
    }

    /// Logs the outcome and publishes the resulting auth state.
    fn finish<V>(&self, operation: &str, result: AuthResult<V>) -> AuthResult<V> {
        match &result {
            Ok(_) => info!("event=auth_{} module=identity_service status=ok", operation),
            Err(err) => warn!(
                "event=auth_{} module=identity_service status=error error_code={}",
                operation,
                err.code()
            ),
        }
        let state = self.current_user();
        for (id, _) in self.hub.matching(|_| true) {
            self.hub.publish(id, state.clone());
        }
        result
    }
}
