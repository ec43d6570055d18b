//! Task domain model.
//!
//! # Responsibility
//! - Define the single record type managed by the task service.
//! - Provide status/priority enums with stable string forms.
//!
//! # Invariants
//! - `id` is assigned once and never reused for another task.
//! - `owner_id` is the only principal allowed to read or write the task.
//! - `title` is 1-200 chars and not blank; `description` is at most 1000 chars.
//! - `created_at`/`updated_at` are store-assigned epoch milliseconds.

use crate::validation::rules::{is_valid_task_description, is_valid_task_title};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable, store-assigned task identifier.
pub type TaskId = Uuid;

/// Completion state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    /// Stable string id used in storage and forms.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Returns the opposite state (pending <-> completed).
    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(TaskValidationError::InvalidStatus)
    }
}

/// Task urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    /// Stable string id used in storage and forms.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl Display for TaskPriority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = TaskValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(TaskValidationError::InvalidPriority)
    }
}

/// Field-level validation failure for task input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskValidationError {
    InvalidTitle,
    InvalidDescription,
    InvalidStatus,
    InvalidPriority,
    /// Owner id is blank.
    MissingOwner,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "Invalid todo title"),
            Self::InvalidDescription => write!(f, "Invalid todo description"),
            Self::InvalidStatus => write!(f, "Invalid status"),
            Self::InvalidPriority => write!(f, "Invalid priority"),
            Self::MissingOwner => write!(f, "Task owner is required"),
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Subject id of the identity that owns this task.
    pub owner_id: String,
    pub title: String,
    /// Empty string when the user gave no description.
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Unix epoch milliseconds.
    pub due_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Creates a pending, medium-priority task with a generated id.
    ///
    /// Timestamps stay zero until the store assigns them.
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            due_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Checks persisted-shape invariants.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.owner_id.trim().is_empty() {
            return Err(TaskValidationError::MissingOwner);
        }
        if !is_valid_task_title(&self.title) {
            return Err(TaskValidationError::InvalidTitle);
        }
        if !is_valid_task_description(&self.description) {
            return Err(TaskValidationError::InvalidDescription);
        }
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// A pending task whose due time lies strictly before `now_ms`.
    pub fn is_overdue_at(&self, now_ms: i64) -> bool {
        self.status == TaskStatus::Pending && self.due_at.is_some_and(|due| due < now_ms)
    }

    /// Case-insensitive substring match over title and description.
    ///
    /// `needle` must already be lower-cased.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || (!self.description.is_empty() && self.description.to_lowercase().contains(needle))
    }
}

/// Optional server-side style filter for list and live queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl TaskFilter {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            priority: None,
        }
    }

    pub fn with_priority(priority: TaskPriority) -> Self {
        Self {
            status: None,
            priority: Some(priority),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |status| task.status == status)
            && self.priority.map_or(true, |priority| task.priority == priority)
    }
}

/// User input for task creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to `medium`.
    pub priority: Option<TaskPriority>,
    pub due_at: Option<i64>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// `Some(None)` clears the due date.
    pub due_at: Option<Option<i64>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskFilter, TaskPriority, TaskStatus, TaskValidationError};

    #[test]
    fn new_task_defaults_to_pending_medium() {
        let task = Task::new("owner-a", "Buy milk");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.description, "");
        assert!(task.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_owner_and_long_title() {
        let mut task = Task::new("  ", "ok");
        assert_eq!(task.validate(), Err(TaskValidationError::MissingOwner));

        task.owner_id = "owner".to_string();
        task.title = "x".repeat(201);
        assert_eq!(task.validate(), Err(TaskValidationError::InvalidTitle));
    }

    #[test]
    fn status_toggle_is_an_involution() {
        assert_eq!(TaskStatus::Pending.toggled(), TaskStatus::Completed);
        assert_eq!(TaskStatus::Pending.toggled().toggled(), TaskStatus::Pending);
    }

    #[test]
    fn enum_parsing_rejects_unknown_values() {
        assert_eq!("high".parse::<TaskPriority>(), Ok(TaskPriority::High));
        assert_eq!(
            "urgent".parse::<TaskPriority>(),
            Err(TaskValidationError::InvalidPriority)
        );
        assert_eq!(
            "done".parse::<TaskStatus>(),
            Err(TaskValidationError::InvalidStatus)
        );
    }

    #[test]
    fn overdue_requires_pending_and_past_due() {
        let mut task = Task::new("owner", "report");
        task.due_at = Some(1_000);
        assert!(task.is_overdue_at(1_001));
        assert!(!task.is_overdue_at(1_000));

        task.status = TaskStatus::Completed;
        assert!(!task.is_overdue_at(5_000));
    }

    #[test]
    fn filter_matches_on_all_present_fields() {
        let mut task = Task::new("owner", "report");
        task.priority = TaskPriority::High;

        assert!(TaskFilter::default().matches(&task));
        assert!(TaskFilter::with_priority(TaskPriority::High).matches(&task));
        assert!(!TaskFilter::with_status(TaskStatus::Completed).matches(&task));
    }
}
