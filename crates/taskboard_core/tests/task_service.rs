use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use taskboard_core::db::open_db_in_memory;
use taskboard_core::model::task::{NewTask, TaskPatch};
use taskboard_core::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use taskboard_core::service::task_service::TaskHub;
use taskboard_core::{
    RepoError, RepoResult, Task, TaskFilter, TaskId, TaskPriority, TaskService, TaskServiceError,
    TaskStatus,
};

const OWNER_A: &str = "uid-a";
const OWNER_B: &str = "uid-b";

#[test]
fn create_task_applies_defaults() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));

    let task = service
        .create_task(
            OWNER_A,
            NewTask {
                title: "Buy milk".to_string(),
                priority: Some(TaskPriority::Medium),
                ..NewTask::default()
            },
        )
        .unwrap();

    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.priority, TaskPriority::Medium);
    assert_eq!(task.description, "");
    assert_eq!(task.owner_id, OWNER_A);
    assert!(task.created_at > 0);
}

#[test]
fn create_task_trims_and_validates_input() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));

    let task = service
        .create_task(
            OWNER_A,
            NewTask {
                title: "  Walk dog  ".to_string(),
                description: Some("  around the block ".to_string()),
                ..NewTask::default()
            },
        )
        .unwrap();
    assert_eq!(task.title, "Walk dog");
    assert_eq!(task.description, "around the block");

    let err = service.create_task(OWNER_A, NewTask::titled("   ")).unwrap_err();
    assert_eq!(err.to_string(), "Invalid todo title");

    let err = service
        .create_task(
            OWNER_A,
            NewTask {
                title: "ok".to_string(),
                description: Some("d".repeat(1001)),
                ..NewTask::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid todo description");
}

#[test]
fn toggling_twice_restores_status() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let task = service.create_task(OWNER_A, NewTask::titled("Read")).unwrap();

    let once = service.toggle_task_status(task.id, OWNER_A).unwrap();
    assert_eq!(once.status, TaskStatus::Completed);
    let twice = service.toggle_task_status(task.id, OWNER_A).unwrap();
    assert_eq!(twice.status, task.status);
}

#[test]
fn only_the_owner_can_read_a_task() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let task = service.create_task(OWNER_A, NewTask::titled("Secret")).unwrap();

    let err = service.get_task(task.id, OWNER_B).unwrap_err();
    assert!(matches!(err, TaskServiceError::Unauthorized));
    assert_eq!(err.to_string(), "Unauthorized access");

    let loaded = service.get_task(task.id, OWNER_A).unwrap();
    assert_eq!(loaded.id, task.id);
}

#[test]
fn foreign_owner_cannot_update_or_delete() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let task = service.create_task(OWNER_A, NewTask::titled("Mine")).unwrap();

    let err = service
        .update_task(task.id, TaskPatch::status(TaskStatus::Completed), OWNER_B)
        .unwrap_err();
    assert!(matches!(err, TaskServiceError::Unauthorized));
    assert!(matches!(
        service.delete_task(task.id, OWNER_B).unwrap_err(),
        TaskServiceError::Unauthorized
    ));
    assert_eq!(
        service.get_task(task.id, OWNER_A).unwrap().status,
        TaskStatus::Pending
    );
}

#[test]
fn missing_task_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));

    let err = service.get_task(uuid::Uuid::new_v4(), OWNER_A).unwrap_err();
    assert!(matches!(err, TaskServiceError::NotFound(_)));
    assert_eq!(err.to_string(), "To-do not found");
}

#[test]
fn ownership_is_checked_before_field_validation() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let task = service.create_task(OWNER_A, NewTask::titled("Mine")).unwrap();

    let patch = TaskPatch {
        title: Some(String::new()),
        ..TaskPatch::default()
    };
    assert!(matches!(
        service.update_task(task.id, patch.clone(), OWNER_B).unwrap_err(),
        TaskServiceError::Unauthorized
    ));
    assert_eq!(
        service.update_task(task.id, patch, OWNER_A).unwrap_err().to_string(),
        "Invalid todo title"
    );
}

#[test]
fn update_merges_fields_and_clears_due_date() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let task = service
        .create_task(
            OWNER_A,
            NewTask {
                title: "Plan trip".to_string(),
                due_at: Some(1_700_000_000_000),
                ..NewTask::default()
            },
        )
        .unwrap();

    let updated = service
        .update_task(
            task.id,
            TaskPatch {
                description: Some(" book hotel ".to_string()),
                priority: Some(TaskPriority::High),
                ..TaskPatch::default()
            },
            OWNER_A,
        )
        .unwrap();
    assert_eq!(updated.title, "Plan trip");
    assert_eq!(updated.description, "book hotel");
    assert_eq!(updated.priority, TaskPriority::High);
    assert_eq!(updated.due_at, Some(1_700_000_000_000));

    let cleared = service
        .update_task(
            task.id,
            TaskPatch {
                due_at: Some(None),
                ..TaskPatch::default()
            },
            OWNER_A,
        )
        .unwrap();
    assert_eq!(cleared.due_at, None);
}

#[test]
fn list_is_newest_first_and_filtered() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let first = service.create_task(OWNER_A, NewTask::titled("first")).unwrap();
    let second = service.create_task(OWNER_A, NewTask::titled("second")).unwrap();
    service.create_task(OWNER_B, NewTask::titled("other")).unwrap();
    service.toggle_task_status(first.id, OWNER_A).unwrap();

    let all = service.list_tasks(OWNER_A, &TaskFilter::default()).unwrap();
    let ids: Vec<_> = all.iter().map(|task| task.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let pending = service
        .list_tasks(OWNER_A, &TaskFilter::with_status(TaskStatus::Pending))
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);
}

#[test]
fn delete_completed_removes_only_completed_tasks() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let mut completed = Vec::new();
    for title in ["a", "b", "c"] {
        let task = service.create_task(OWNER_A, NewTask::titled(title)).unwrap();
        completed.push(service.toggle_task_status(task.id, OWNER_A).unwrap());
    }
    let pending = service.create_task(OWNER_A, NewTask::titled("keep")).unwrap();
    let foreign = service.create_task(OWNER_B, NewTask::titled("theirs")).unwrap();
    service.toggle_task_status(foreign.id, OWNER_B).unwrap();

    let removed = service.delete_completed_tasks(OWNER_A).unwrap();
    assert_eq!(removed, completed.len());

    let remaining = service.list_tasks(OWNER_A, &TaskFilter::default()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, pending.id);
    assert_eq!(remaining[0].status, TaskStatus::Pending);
    assert!(service.get_task(foreign.id, OWNER_B).is_ok());

    assert_eq!(service.delete_completed_tasks(OWNER_A).unwrap(), 0);
}

#[test]
fn search_is_case_insensitive_over_title_and_description() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    service.create_task(OWNER_A, NewTask::titled("Buy MILK")).unwrap();
    service
        .create_task(
            OWNER_A,
            NewTask {
                title: "Errands".to_string(),
                description: Some("pick up milk too".to_string()),
                ..NewTask::default()
            },
        )
        .unwrap();
    service.create_task(OWNER_A, NewTask::titled("Gym")).unwrap();

    assert_eq!(service.search_tasks(OWNER_A, "Milk").unwrap().len(), 2);
    assert_eq!(service.search_tasks(OWNER_A, "  ").unwrap().len(), 3);
    assert!(service.search_tasks(OWNER_B, "milk").unwrap().is_empty());
}

#[test]
fn stats_count_overdue_pending_high_priority() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let now_ms = 1_800_000_000_000;

    let empty = service.stats_at(OWNER_A, now_ms).unwrap();
    assert_eq!(empty.total, 0);
    assert_eq!(empty.overdue, 0);
    assert_eq!(empty.high_priority, 0);

    service
        .create_task(
            OWNER_A,
            NewTask {
                title: "Late report".to_string(),
                priority: Some(TaskPriority::High),
                due_at: Some(now_ms - 60_000),
                ..NewTask::default()
            },
        )
        .unwrap();

    let stats = service.stats_at(OWNER_A, now_ms).unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.overdue, 1);
    assert_eq!(stats.high_priority, 1);
}

#[test]
fn subscription_delivers_initial_and_full_snapshots() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    service.create_task(OWNER_A, NewTask::titled("existing")).unwrap();

    let subscription = service.subscribe(OWNER_A, TaskFilter::default()).unwrap();
    assert_eq!(subscription.try_recv().unwrap().len(), 1);

    service.create_task(OWNER_A, NewTask::titled("new")).unwrap();
    let snapshot = subscription.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(snapshot.len(), 2);

    service.create_task(OWNER_B, NewTask::titled("elsewhere")).unwrap();
    assert!(subscription.try_recv().is_none());
}

#[test]
fn filtered_subscription_reflects_status_changes() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    let task = service.create_task(OWNER_A, NewTask::titled("todo")).unwrap();

    let completed = service
        .subscribe(OWNER_A, TaskFilter::with_status(TaskStatus::Completed))
        .unwrap();
    assert!(completed.try_recv().unwrap().is_empty());

    service.toggle_task_status(task.id, OWNER_A).unwrap();
    let snapshot = completed.latest().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, task.id);
}

#[test]
fn services_sharing_a_hub_see_each_others_writes() {
    let conn = open_db_in_memory().unwrap();
    let hub = TaskHub::new("tasks");
    let reader = TaskService::with_hub(SqliteTaskRepository::new(&conn), hub.clone());
    let writer = TaskService::with_hub(SqliteTaskRepository::new(&conn), hub.clone());

    let subscription = reader.subscribe(OWNER_A, TaskFilter::default()).unwrap();
    subscription.try_recv().unwrap();

    writer.create_task(OWNER_A, NewTask::titled("shared")).unwrap();
    assert_eq!(subscription.try_recv().unwrap().len(), 1);
}

#[test]
fn cancelled_subscription_is_unregistered() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));

    let subscription = service.subscribe(OWNER_A, TaskFilter::default()).unwrap();
    assert_eq!(service.hub().len(), 1);
    subscription.cancel();
    assert!(service.hub().is_empty());

    {
        let _dropped = service.subscribe(OWNER_A, TaskFilter::default()).unwrap();
        assert_eq!(service.hub().len(), 1);
    }
    assert!(service.hub().is_empty());

    service.create_task(OWNER_A, NewTask::titled("after cancel")).unwrap();
}

#[test]
fn priority_filter_limits_list_and_subscription() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(SqliteTaskRepository::new(&conn));
    for (title, priority) in [("urgent", TaskPriority::High), ("later", TaskPriority::Low)] {
        service
            .create_task(
                OWNER_A,
                NewTask {
                    title: title.to_string(),
                    priority: Some(priority),
                    ..NewTask::default()
                },
            )
            .unwrap();
    }

    let high = TaskFilter::with_priority(TaskPriority::High);
    let listed = service.list_tasks(OWNER_A, &high).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "urgent");

    let subscription = service.subscribe(OWNER_A, high).unwrap();
    assert_eq!(subscription.try_recv().unwrap().len(), 1);
    service
        .create_task(
            OWNER_A,
            NewTask {
                title: "also urgent".to_string(),
                priority: Some(TaskPriority::High),
                ..NewTask::default()
            },
        )
        .unwrap();
    assert_eq!(subscription.latest().unwrap().len(), 2);
}

/// Delegates to SQLite but fails list queries once `fail_lists` is set.
struct FlakyListRepository<'conn> {
    inner: SqliteTaskRepository<'conn>,
    fail_lists: Rc<Cell<bool>>,
}

impl TaskRepository for FlakyListRepository<'_> {
    fn create_task(&self, task: &Task) -> RepoResult<TaskId> {
        self.inner.create_task(task)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        self.inner.get_task(id)
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        self.inner.update_task(task)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        self.inner.delete_task(id)
    }

    fn list_tasks(&self, owner_id: &str, filter: &TaskFilter) -> RepoResult<Vec<Task>> {
        if self.fail_lists.get() {
            return Err(RepoError::InvalidData("list unavailable".to_string()));
        }
        self.inner.list_tasks(owner_id, filter)
    }

    fn delete_tasks_with_status(&self, owner_id: &str, status: TaskStatus) -> RepoResult<usize> {
        self.inner.delete_tasks_with_status(owner_id, status)
    }
}

#[test]
fn failed_requery_delivers_empty_snapshot() {
    let conn = open_db_in_memory().unwrap();
    let fail_lists = Rc::new(Cell::new(false));
    let service = TaskService::new(FlakyListRepository {
        inner: SqliteTaskRepository::new(&conn),
        fail_lists: fail_lists.clone(),
    });
    service.create_task(OWNER_A, NewTask::titled("existing")).unwrap();

    let subscription = service.subscribe(OWNER_A, TaskFilter::default()).unwrap();
    assert_eq!(subscription.try_recv().unwrap().len(), 1);

    fail_lists.set(true);
    service.create_task(OWNER_A, NewTask::titled("second")).unwrap();
    assert_eq!(subscription.try_recv(), Some(Vec::new()));
    assert_eq!(service.hub().len(), 1);
}
