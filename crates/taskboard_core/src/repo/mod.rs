//! Document-store access contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define record-oriented data access traits for tasks and profiles.
//! - Isolate SQL details from service-level orchestration.
//!
//! # Invariants
//! - Write paths validate records before persistence.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repositories never check ownership; services do.

use crate::db::DbError;
use crate::model::profile::ProfileValidationError;
use crate::model::task::{TaskId, TaskValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod profile_repo;
pub mod task_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    InvalidTask(TaskValidationError),
    InvalidProfile(ProfileValidationError),
    Db(DbError),
    TaskNotFound(TaskId),
    ProfileNotFound(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTask(err) => write!(f, "{err}"),
            Self::InvalidProfile(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::ProfileNotFound(uid) => write!(f, "profile not found: {uid}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTask(err) => Some(err),
            Self::InvalidProfile(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::TaskNotFound(_) | Self::ProfileNotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::InvalidTask(value)
    }
}

impl From<ProfileValidationError> for RepoError {
    fn from(value: ProfileValidationError) -> Self {
        Self::InvalidProfile(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
