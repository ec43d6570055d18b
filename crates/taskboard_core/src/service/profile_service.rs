//! User profile use-case service.
//!
//! # Responsibility
//! - Create, read, merge-update and delete the profile record of an identity.
//! - Derive profile-level task statistics.
//! - Publish profile snapshots to live queries keyed by uid.
//!
//! # Invariants
//! - `update_profile` never creates a missing profile.
//! - Deleting a profile never touches the owner's tasks.

use crate::live::{LiveQueryHub, LiveSubscription};
use crate::model::profile::{NewProfile, ProfilePatch, ProfileValidationError, UserProfile};
use crate::model::task::{TaskFilter, TaskPriority, TaskStatus};
use crate::repo::profile_repo::ProfileRepository;
use crate::repo::task_repo::TaskRepository;
use crate::repo::RepoError;
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type ProfileResult<T> = Result<T, ProfileServiceError>;

/// Live-query registry for profile snapshots, keyed by uid.
pub type ProfileHub = LiveQueryHub<String, Option<UserProfile>>;
/// Stream of profile snapshots; `None` while no profile exists.
pub type ProfileSubscription = LiveSubscription<Option<UserProfile>>;

#[derive(Debug)]
pub enum ProfileServiceError {
    Validation(ProfileValidationError),
    NotFound(String),
    Repo {
        action: &'static str,
        source: RepoError,
    },
    InconsistentState(&'static str),
}

impl Display for ProfileServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(_) => write!(f, "User profile not found"),
            Self::Repo { action, .. } => write!(f, "Failed to {action}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent profile state: {details}")
            }
        }
    }
}

impl Error for ProfileServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn repo_failure(action: &'static str) -> impl FnOnce(RepoError) -> ProfileServiceError {
    move |err| match err {
        RepoError::ProfileNotFound(uid) => ProfileServiceError::NotFound(uid),
        RepoError::InvalidProfile(validation) => ProfileServiceError::Validation(validation),
        source => ProfileServiceError::Repo { action, source },
    }
}

/// Task counters shown on the profile page.
///
/// `high_priority_tasks` counts every status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub high_priority_tasks: usize,
}

pub struct ProfileService<P: ProfileRepository, T: TaskRepository> {
    profiles: P,
    tasks: T,
    hub: Arc<ProfileHub>,
}

impl<P: ProfileRepository, T: TaskRepository> ProfileService<P, T> {
    pub fn new(profiles: P, tasks: T) -> Self {
        Self::with_hub(profiles, tasks, ProfileHub::new("profiles"))
    }

    pub fn with_hub(profiles: P, tasks: T, hub: Arc<ProfileHub>) -> Self {
        Self {
            profiles,
            tasks,
            hub,
        }
    }

    /// Writes a fresh profile, replacing any existing one for the uid.
    pub fn create_profile(&self, input: NewProfile) -> ProfileResult<UserProfile> {
        let profile = input.into_profile();
        self.profiles
            .set_profile(&profile)
            .map_err(repo_failure("create user profile"))?;
        let created = self
            .profiles
            .get_profile(&profile.uid)
            .map_err(repo_failure("create user profile"))?
            .ok_or(ProfileServiceError::InconsistentState(
                "created profile not found in read-back",
            ))?;

        info!(
            "event=profile_create module=profile_service status=ok uid={} provider={}",
            created.uid, created.provider
        );
        self.publish(&created.uid, Some(created.clone()));
        Ok(created)
    }

    pub fn get_profile(&self, uid: &str) -> ProfileResult<Option<UserProfile>> {
        self.profiles
            .get_profile(uid)
            .map_err(repo_failure("get user profile"))
    }

    pub fn profile_exists(&self, uid: &str) -> ProfileResult<bool> {
        Ok(self.get_profile(uid)?.is_some())
    }

    /// Merges provided fields into the stored profile.
    pub fn update_profile(&self, uid: &str, patch: &ProfilePatch) -> ProfileResult<UserProfile> {
        let mut profile = self
            .get_profile(uid)?
            .ok_or_else(|| ProfileServiceError::NotFound(uid.to_string()))?;
        patch.apply(&mut profile);

        self.profiles
            .update_profile(&profile)
            .map_err(repo_failure("update user profile"))?;
        let updated = self
            .get_profile(uid)?
            .ok_or(ProfileServiceError::InconsistentState(
                "updated profile not found in read-back",
            ))?;

        info!(
            "event=profile_update module=profile_service status=ok uid={}",
            uid
        );
        self.publish(uid, Some(updated.clone()));
        Ok(updated)
    }

    /// Removes the profile. Returns whether one existed.
    pub fn delete_profile(&self, uid: &str) -> ProfileResult<bool> {
        let removed = self
            .profiles
            .delete_profile(uid)
            .map_err(repo_failure("delete user profile"))?;
        info!(
            "event=profile_delete module=profile_service status=ok uid={} removed={}",
            uid, removed
        );
        if removed {
            self.publish(uid, None);
        }
        Ok(removed)
    }

    pub fn profile_stats(&self, uid: &str) -> ProfileResult<ProfileStats> {
        let tasks = self
            .tasks
            .list_tasks(uid, &TaskFilter::default())
            .map_err(repo_failure("get user stats"))?;

        Ok(ProfileStats {
            total_tasks: tasks.len(),
            completed_tasks: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count(),
            pending_tasks: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Pending)
                .count(),
            high_priority_tasks: tasks
                .iter()
                .filter(|t| t.priority == TaskPriority::High)
                .count(),
        })
    }

    /// Live query over one profile record.
    pub fn subscribe(&self, uid: &str) -> ProfileResult<ProfileSubscription> {
        let initial = self.get_profile(uid)?;
        Ok(self.hub.register(uid.to_string(), initial))
    }

    fn publish(&self, uid: &str, snapshot: Option<UserProfile>) {
        for (id, _) in self.hub.matching(|key| key == uid) {
            if !self.hub.publish(id, snapshot.clone()) {
                warn!(
                    "event=profile_publish module=profile_service status=error watch_id={} error_code=subscriber_gone",
                    id
                );
            }
        }
    }
}
