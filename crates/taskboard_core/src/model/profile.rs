//! User profile domain model.
//!
//! # Invariants
//! - At most one profile exists per identity subject id (`uid`).
//! - `provider` records the sign-in method used when the profile was created.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Sign-in method that created an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    Email,
    Google,
    Github,
}

impl AuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Google => "google",
            Self::Github => "github",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "email" => Some(Self::Email),
            "google" => Some(Self::Google),
            "github" => Some(Self::Github),
            _ => None,
        }
    }

    /// Human-readable provider name for notifications.
    pub fn label(self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Google => "Google",
            Self::Github => "GitHub",
        }
    }
}

impl Display for AuthProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileValidationError {
    MissingUid,
    MissingName,
}

impl Display for ProfileValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingUid => write!(f, "Profile uid is required"),
            Self::MissingName => write!(f, "Name is required"),
        }
    }
}

impl Error for ProfileValidationError {}

/// Stored profile for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub provider: AuthProvider,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserProfile {
    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        if self.uid.trim().is_empty() {
            return Err(ProfileValidationError::MissingUid);
        }
        if self.name.trim().is_empty() {
            return Err(ProfileValidationError::MissingName);
        }
        Ok(())
    }
}

/// Input for profile creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub provider: AuthProvider,
}

impl NewProfile {
    pub(crate) fn into_profile(self) -> UserProfile {
        UserProfile {
            uid: self.uid,
            name: self.name,
            email: self.email,
            photo_url: self.photo_url.filter(|url| !url.trim().is_empty()),
            provider: self.provider,
            created_at: 0,
            updated_at: 0,
        }
    }
}

impl From<UserProfile> for NewProfile {
    fn from(profile: UserProfile) -> Self {
        Self {
            uid: profile.uid,
            name: profile.name,
            email: profile.email,
            photo_url: profile.photo_url,
            provider: profile.provider,
        }
    }
}

/// Merge-style profile update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    /// `Some(None)` clears the avatar.
    pub photo_url: Option<Option<String>>,
}

impl ProfilePatch {
    pub(crate) fn apply(&self, profile: &mut UserProfile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(photo_url) = &self.photo_url {
            profile.photo_url = photo_url.clone().filter(|url| !url.trim().is_empty());
        }
    }
}

/// Falls back to the local part of an email address when no name is known.
pub fn fallback_display_name(name: Option<&str>, email: &str) -> String {
    match name.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value.to_string(),
        None => email.split('@').next().unwrap_or_default().to_string(),
    }
}
