//! Task use-case service.
//!
//! # Responsibility
//! - Validate task input and enforce ownership before touching the store.
//! - Provide filtered lists, search, statistics and live queries per owner.
//!
//! # Invariants
//! - Only the owner of a task may read, update, toggle or delete it; the
//!   check is an explicit equality on `owner_id`.
//! - Existence and ownership are checked before field validation.
//! - Every committed change publishes a full snapshot to each live query of
//!   the affected owner.
//! - Search and statistics re-fetch and reduce the owner's full list.

use crate::live::{LiveQueryHub, LiveSubscription};
use crate::model::task::{
    NewTask, Task, TaskFilter, TaskId, TaskPatch, TaskPriority, TaskStatus, TaskValidationError,
};
use crate::repo::task_repo::TaskRepository;
use crate::repo::RepoError;
use crate::validation::rules::{is_valid_task_description, is_valid_task_title};
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type TaskResult<T> = Result<T, TaskServiceError>;

/// Scope of one live task query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskWatch {
    pub owner_id: String,
    pub filter: TaskFilter,
}

/// Live-query registry shared by every task service on one store.
pub type TaskHub = LiveQueryHub<TaskWatch, Vec<Task>>;
/// Stream of full task-list snapshots for one owner and filter.
pub type TaskSubscription = LiveSubscription<Vec<Task>>;

/// Errors from task use-cases. `Display` is the user-facing message.
#[derive(Debug)]
pub enum TaskServiceError {
    Validation(TaskValidationError),
    NotFound(TaskId),
    /// Caller is not the owner of the task.
    Unauthorized,
    /// Store failure while performing `action`.
    Repo {
        action: &'static str,
        source: RepoError,
    },
    /// Write succeeded but read-back did not return the record.
    InconsistentState(&'static str),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(_) => write!(f, "To-do not found"),
            Self::Unauthorized => write!(f, "Unauthorized access"),
            Self::Repo { action, .. } => write!(f, "Failed to {action}"),
            Self::InconsistentState(details) => write!(f, "inconsistent task state: {details}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for TaskServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Maps a repository error, keeping semantic cases distinct.
fn repo_failure(action: &'static str) -> impl FnOnce(RepoError) -> TaskServiceError {
    move |err| match err {
        RepoError::TaskNotFound(id) => TaskServiceError::NotFound(id),
        RepoError::InvalidTask(validation) => TaskServiceError::Validation(validation),
        source => TaskServiceError::Repo { action, source },
    }
}

/// Per-owner counters.
///
/// Priority counters only count pending tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub overdue: usize,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task], now_ms: i64) -> Self {
        tasks.iter().fold(
            Self {
                total: tasks.len(),
                ..Self::default()
            },
            |mut stats, task| {
                match task.status {
                    TaskStatus::Completed => stats.completed += 1,
                    TaskStatus::Pending => {
                        stats.pending += 1;
                        match task.priority {
                            TaskPriority::High => stats.high_priority += 1,
                            TaskPriority::Medium => stats.medium_priority += 1,
                            TaskPriority::Low => stats.low_priority += 1,
                        }
                    }
                }
                if task.is_overdue_at(now_ms) {
                    stats.overdue += 1;
                }
                stats
            },
        )
    }
}

/// Task service facade over a repository and a live-query hub.
pub struct TaskService<R: TaskRepository> {
    repo: R,
    hub: Arc<TaskHub>,
}

impl<R: TaskRepository> TaskService<R> {
    /// Creates a service with a private hub.
    pub fn new(repo: R) -> Self {
        Self::with_hub(repo, TaskHub::new("tasks"))
    }

    /// Creates a service publishing to a shared hub.
    pub fn with_hub(repo: R, hub: Arc<TaskHub>) -> Self {
        Self { repo, hub }
    }

    pub fn hub(&self) -> &Arc<TaskHub> {
        &self.hub
    }

    /// Creates a pending task owned by `owner_id`.
    ///
    /// Title and description are validated as entered, then stored trimmed.
    pub fn create_task(&self, owner_id: &str, input: NewTask) -> TaskResult<Task> {
        if !is_valid_task_title(&input.title) {
            return Err(TaskValidationError::InvalidTitle.into());
        }
        if let Some(description) = input.description.as_deref() {
            if !is_valid_task_description(description) {
                return Err(TaskValidationError::InvalidDescription.into());
            }
        }

        let mut task = Task::new(owner_id, input.title.trim());
        task.description = input
            .description
            .map(|description| description.trim().to_string())
            .unwrap_or_default();
        task.priority = input.priority.unwrap_or_default();
        task.due_at = input.due_at;

        let id = self
            .repo
            .create_task(&task)
            .map_err(repo_failure("create to-do"))?;
        let created = self
            .repo
            .get_task(id)
            .map_err(repo_failure("create to-do"))?
            .ok_or(TaskServiceError::InconsistentState(
                "created task not found in read-back",
            ))?;

        info!(
            "event=task_create module=task_service status=ok task_id={} owner_id={}",
            id, owner_id
        );
        self.publish(owner_id);
        Ok(created)
    }

    /// Loads one task, enforcing ownership.
    pub fn get_task(&self, id: TaskId, owner_id: &str) -> TaskResult<Task> {
        let task = self
            .repo
            .get_task(id)
            .map_err(repo_failure("get to-do"))?
            .ok_or(TaskServiceError::NotFound(id))?;
        if task.owner_id != owner_id {
            warn!(
                "event=task_access module=task_service status=error error_code=unauthorized task_id={}",
                id
            );
            return Err(TaskServiceError::Unauthorized);
        }
        Ok(task)
    }

    /// Lists the owner's tasks, newest first.
    pub fn list_tasks(&self, owner_id: &str, filter: &TaskFilter) -> TaskResult<Vec<Task>> {
        self.repo
            .list_tasks(owner_id, filter)
            .map_err(repo_failure("get to-dos"))
    }

    /// Applies a partial update and returns the stored result.
    pub fn update_task(&self, id: TaskId, patch: TaskPatch, owner_id: &str) -> TaskResult<Task> {
        let mut task = self.get_task(id, owner_id)?;

        if let Some(title) = patch.title.as_deref() {
            if !is_valid_task_title(title) {
                return Err(TaskValidationError::InvalidTitle.into());
            }
            task.title = title.trim().to_string();
        }
        if let Some(description) = patch.description.as_deref() {
            if !is_valid_task_description(description) {
                return Err(TaskValidationError::InvalidDescription.into());
            }
            task.description = description.trim().to_string();
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_at) = patch.due_at {
            task.due_at = due_at;
        }

        self.repo
            .update_task(&task)
            .map_err(repo_failure("update to-do"))?;
        info!(
            "event=task_update module=task_service status=ok task_id={} owner_id={}",
            id, owner_id
        );
        self.publish(owner_id);
        self.get_task(id, owner_id)
    }

    /// Flips pending <-> completed.
    pub fn toggle_task_status(&self, id: TaskId, owner_id: &str) -> TaskResult<Task> {
        let task = self.get_task(id, owner_id)?;
        self.update_task(id, TaskPatch::status(task.status.toggled()), owner_id)
    }

    pub fn delete_task(&self, id: TaskId, owner_id: &str) -> TaskResult<()> {
        self.get_task(id, owner_id)?;
        self.repo
            .delete_task(id)
            .map_err(repo_failure("delete to-do"))?;
        info!(
            "event=task_delete module=task_service status=ok task_id={} owner_id={}",
            id, owner_id
        );
        self.publish(owner_id);
        Ok(())
    }

    /// Removes every completed task of the owner in one batch.
    ///
    /// Returns the number of tasks removed.
    pub fn delete_completed_tasks(&self, owner_id: &str) -> TaskResult<usize> {
        let removed = self
            .repo
            .delete_tasks_with_status(owner_id, TaskStatus::Completed)
            .map_err(repo_failure("delete completed to-dos"))?;
        info!(
            "event=task_delete_completed module=task_service status=ok owner_id={} removed={}",
            owner_id, removed
        );
        if removed > 0 {
            self.publish(owner_id);
        }
        Ok(removed)
    }

    /// Case-insensitive substring search over title and description.
    ///
    /// A blank term returns the full list.
    pub fn search_tasks(&self, owner_id: &str, term: &str) -> TaskResult<Vec<Task>> {
        let tasks = self
            .repo
            .list_tasks(owner_id, &TaskFilter::default())
            .map_err(repo_failure("search to-dos"))?;
        if term.trim().is_empty() {
            return Ok(tasks);
        }
        let needle = term.to_lowercase();
        Ok(tasks
            .into_iter()
            .filter(|task| task.matches_search(&needle))
            .collect())
    }

    /// Registers a live query.
    ///
    /// The returned subscription yields the current list immediately and a
    /// full snapshot after every change to the owner's tasks.
    pub fn subscribe(&self, owner_id: &str, filter: TaskFilter) -> TaskResult<TaskSubscription> {
        let initial = self.list_tasks(owner_id, &filter)?;
        Ok(self.hub.register(
            TaskWatch {
                owner_id: owner_id.to_string(),
                filter,
            },
            initial,
        ))
    }

    pub fn stats(&self, owner_id: &str) -> TaskResult<TaskStats> {
        self.stats_at(owner_id, Utc::now().timestamp_millis())
    }

    /// Statistics with an explicit clock, in epoch milliseconds.
    pub fn stats_at(&self, owner_id: &str, now_ms: i64) -> TaskResult<TaskStats> {
        let tasks = self
            .repo
            .list_tasks(owner_id, &TaskFilter::default())
            .map_err(repo_failure("get to-do stats"))?;
        Ok(TaskStats::from_tasks(&tasks, now_ms))
    }

    fn publish(&self, owner_id: &str) {
        for (id, watch) in self.hub.matching(|watch| watch.owner_id == owner_id) {
            let snapshot = match self.repo.list_tasks(&watch.owner_id, &watch.filter) {
                Ok(tasks) => tasks,
                Err(err) => {
                    warn!(
                        "event=task_publish module=task_service status=error watch_id={} error={}",
                        id, err
                    );
                    Vec::new()
                }
            };
            self.hub.publish(id, snapshot);
        }
    }
}
