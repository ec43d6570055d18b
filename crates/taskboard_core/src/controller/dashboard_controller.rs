//! Dashboard page controller.
//!
//! # Responsibility
//! - Keep the signed-in user's task list in sync with a live query.
//! - Apply the status filter and free-text search client-side.
//! - Drive the add/edit editor and the row actions.
//!
//! # Invariants
//! - The live subscription is cancelled before sign-out.
//! - Search terms are stored lower-cased.

use super::{Notification, Route};
use crate::app::AppContext;
use crate::identity::ProviderUser;
use crate::model::profile::fallback_display_name;
use crate::model::task::{NewTask, Task, TaskFilter, TaskId, TaskPatch, TaskPriority, TaskStatus};
use crate::service::task_service::{TaskStats, TaskSubscription};
use crate::validation::rules::{
    escape_html, is_valid_task_description, is_valid_task_title, parse_due_date,
};
use chrono::{DateTime, Utc};
use log::{info, warn};

const EDITOR_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DISPLAY_DATE_FORMAT: &str = "%b %-d, %Y, %I:%M %p";

/// Status tabs above the task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Pending => task.status == TaskStatus::Pending,
            Self::Completed => task.status == TaskStatus::Completed,
        }
    }
}

/// Editor modal contents, as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    /// `YYYY-MM-DDTHH:MM`, or blank for no due date.
    pub due_date: String,
}

impl TaskForm {
    fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            due_date: task
                .due_at
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(|due| due.format(EDITOR_DATE_FORMAT).to_string())
                .unwrap_or_default(),
        }
    }
}

/// Render-ready list row. Text fields are HTML-escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub priority_label: &'static str,
    pub status_label: &'static str,
    pub completed: bool,
    pub due_label: Option<String>,
}

impl TaskRow {
    fn from_task(task: &Task) -> Self {
        Self {
            id: task.id,
            title: escape_html(&task.title),
            description: (!task.description.is_empty()).then(|| escape_html(&task.description)),
            priority_label: priority_label(task.priority),
            status_label: status_label(task.status),
            completed: task.is_completed(),
            due_label: task.due_at.and_then(format_due_date),
        }
    }
}

fn priority_label(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "Low",
        TaskPriority::Medium => "Medium",
        TaskPriority::High => "High",
    }
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "Pending",
        TaskStatus::Completed => "Completed",
    }
}

/// Formats epoch milliseconds like `Mar 7, 2025, 09:30 AM` (UTC).
pub fn format_due_date(due_at: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(due_at)
        .map(|due| due.format(DISPLAY_DATE_FORMAT).to_string())
}

pub struct DashboardController<'a> {
    ctx: &'a AppContext,
    user: Option<ProviderUser>,
    tasks: Vec<Task>,
    filter: StatusFilter,
    search: String,
    editing: Option<TaskId>,
    subscription: Option<TaskSubscription>,
    stats: TaskStats,
    redirect: Option<Route>,
}

impl<'a> DashboardController<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self {
            ctx,
            user: None,
            tasks: Vec::new(),
            filter: StatusFilter::All,
            search: String::new(),
            editing: None,
            subscription: None,
            stats: TaskStats::default(),
            redirect: None,
        }
    }

    /// Binds the controller to the signed-in user and opens the live query.
    ///
    /// Without a signed-in user the controller asks for the sign-in page.
    pub fn start(&mut self) -> Option<Notification> {
        let Some(user) = self.ctx.identity().current_user() else {
            self.redirect = Some(Route::SignIn);
            return None;
        };

        let subscription = match self.ctx.tasks().subscribe(&user.uid, TaskFilter::default()) {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(
                    "event=dashboard_start module=dashboard_controller status=error error={}",
                    err
                );
                return Some(Notification::error("Failed to load user data"));
            }
        };
        info!(
            "event=dashboard_start module=dashboard_controller status=ok watch_id={}",
            subscription.id()
        );
        self.user = Some(user);
        self.subscription = Some(subscription);
        self.sync();
        None
    }

    /// Applies the newest pending snapshot, if any.
    ///
    /// Returns whether the task list changed.
    pub fn sync(&mut self) -> bool {
        let Some(snapshot) = self.subscription.as_ref().and_then(|sub| sub.latest()) else {
            return false;
        };
        self.tasks = snapshot;
        self.refresh_stats();
        true
    }

    pub fn user(&self) -> Option<&ProviderUser> {
        self.user.as_ref()
    }

    /// Greeting name: display name, else the email's local part.
    pub fn display_name(&self) -> Option<String> {
        self.user
            .as_ref()
            .map(|user| fallback_display_name(user.display_name.as_deref(), &user.email))
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn stats(&self) -> TaskStats {
        self.stats
    }

    pub fn redirect(&self) -> Option<Route> {
        self.redirect
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.to_lowercase();
    }

    /// Last-known tasks after the status filter and search term.
    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| self.filter.matches(task))
            .filter(|task| self.search.is_empty() || task.matches_search(&self.search))
            .collect()
    }

    pub fn rows(&self) -> Vec<TaskRow> {
        self.visible_tasks()
            .into_iter()
            .map(TaskRow::from_task)
            .collect()
    }

    pub fn editing(&self) -> Option<TaskId> {
        self.editing
    }

    /// Opens the editor, prefilled for an existing task.
    ///
    /// An unknown id opens an empty editor in add mode.
    pub fn open_editor(&mut self, id: Option<TaskId>) -> TaskForm {
        match id.and_then(|id| self.tasks.iter().find(|task| task.id == id)) {
            Some(task) => {
                self.editing = Some(task.id);
                TaskForm::from_task(task)
            }
            None => {
                self.editing = None;
                TaskForm::default()
            }
        }
    }

    pub fn close_editor(&mut self) {
        self.editing = None;
    }

    /// Creates or updates the task in the editor.
    pub fn save(&mut self, form: &TaskForm) -> Notification {
        let Some(owner_id) = self.owner_id() else {
            return Notification::error("No user logged in");
        };
        let title = form.title.trim();
        let description = form.description.trim();
        if !is_valid_task_title(title) {
            return Notification::error("Please enter a valid title (1-200 characters)");
        }
        if !is_valid_task_description(description) {
            return Notification::error("Description must be less than 1000 characters");
        }
        let due_at = if form.due_date.trim().is_empty() {
            None
        } else {
            match parse_due_date(&form.due_date) {
                Some(due_at) => Some(due_at),
                None => return Notification::error("Invalid due date"),
            }
        };

        let tasks = self.ctx.tasks();
        let outcome = match self.editing {
            Some(id) => tasks
                .update_task(
                    id,
                    TaskPatch {
                        title: Some(title.to_string()),
                        description: Some(description.to_string()),
                        priority: Some(form.priority),
                        due_at: Some(due_at),
                        ..TaskPatch::default()
                    },
                    &owner_id,
                )
                .map(|_| "Task updated successfully!"),
            None => tasks
                .create_task(
                    &owner_id,
                    NewTask {
                        title: title.to_string(),
                        description: Some(description.to_string()),
                        priority: Some(form.priority),
                        due_at,
                    },
                )
                .map(|_| "Task created successfully!"),
        };

        match outcome {
            Ok(message) => {
                self.close_editor();
                self.sync();
                Notification::success(message)
            }
            Err(err) => Notification::error(err.to_string()),
        }
    }

    /// Flips a task's status. Success is silent; the list refreshes.
    pub fn toggle(&mut self, id: TaskId) -> Option<Notification> {
        let owner_id = self.owner_id()?;
        match self.ctx.tasks().toggle_task_status(id, &owner_id) {
            Ok(_) => {
                self.sync();
                None
            }
            Err(err) => Some(Notification::error(err.to_string())),
        }
    }

    pub fn delete(&mut self, id: TaskId) -> Notification {
        let Some(owner_id) = self.owner_id() else {
            return Notification::error("No user logged in");
        };
        match self.ctx.tasks().delete_task(id, &owner_id) {
            Ok(()) => {
                if self.editing == Some(id) {
                    self.editing = None;
                }
                self.sync();
                Notification::success("Task deleted successfully!")
            }
            Err(err) => Notification::error(err.to_string()),
        }
    }

    pub fn clear_completed(&mut self) -> Notification {
        let Some(owner_id) = self.owner_id() else {
            return Notification::error("No user logged in");
        };
        match self.ctx.tasks().delete_completed_tasks(&owner_id) {
            Ok(0) => Notification::info("No completed tasks to clear"),
            Ok(removed) => {
                self.sync();
                Notification::success(format!("Cleared {removed} completed task(s)"))
            }
            Err(err) => Notification::error(err.to_string()),
        }
    }

    /// Stops the live query, then signs out.
    pub fn logout(&mut self) -> Notification {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        match self.ctx.identity().sign_out() {
            Ok(()) => {
                self.user = None;
                self.tasks.clear();
                self.stats = TaskStats::default();
                self.editing = None;
                self.redirect = Some(Route::SignIn);
                Notification::success("Logged out successfully!")
            }
            Err(err) => Notification::error(err.to_string()),
        }
    }

    fn owner_id(&self) -> Option<String> {
        self.user.as_ref().map(|user| user.uid.clone())
    }

    fn refresh_stats(&mut self) {
        let Some(owner_id) = self.owner_id() else {
            return;
        };
        match self.ctx.tasks().stats(&owner_id) {
            Ok(stats) => self.stats = stats,
            Err(err) => warn!(
                "event=dashboard_stats module=dashboard_controller status=error error={}",
                err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{format_due_date, StatusFilter, TaskRow};
    use crate::model::task::{Task, TaskStatus};

    #[test]
    fn due_dates_render_in_short_month_format() {
        // 2025-03-07T09:30:00Z
        assert_eq!(
            format_due_date(1_741_339_800_000).as_deref(),
            Some("Mar 7, 2025, 09:30 AM")
        );
    }

    #[test]
    fn rows_escape_user_text() {
        let mut task = Task::new("o", "<b>bold</b>");
        task.description = "a & b".to_string();
        let row = TaskRow::from_task(&task);
        assert_eq!(row.title, "&lt;b&gt;bold&lt;/b&gt;");
        assert_eq!(row.description.as_deref(), Some("a &amp; b"));
        assert_eq!(row.priority_label, "Medium");
        assert_eq!(row.status_label, "Pending");
        assert!(row.due_label.is_none());
    }

    #[test]
    fn status_filter_matches_by_status() {
        let mut task = Task::new("o", "t");
        assert!(StatusFilter::Pending.matches(&task));
        task.status = TaskStatus::Completed;
        assert!(StatusFilter::Completed.matches(&task));
        assert!(!StatusFilter::Pending.matches(&task));
        assert!(StatusFilter::All.matches(&task));
    }
}
