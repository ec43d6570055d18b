//! Composition root.
//!
//! # Responsibility
//! - Own the store connection, the identity provider and the change hubs
//!   for one running application.
//! - Hand out services bound to that shared state.
//!
//! # Invariants
//! - Every service created from one context publishes to the same hubs, so
//!   a write through any of them reaches every live query of the context.

use crate::config::AppConfig;
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::identity::IdentityProvider;
use crate::repo::profile_repo::SqliteProfileRepository;
use crate::repo::task_repo::SqliteTaskRepository;
use crate::service::identity_service::{AuthHub, IdentityService};
use crate::service::profile_service::{ProfileHub, ProfileService};
use crate::service::task_service::{TaskHub, TaskService};
use log::info;
use rusqlite::Connection;
use std::sync::Arc;

pub type Tasks<'conn> = TaskService<SqliteTaskRepository<'conn>>;
pub type Profiles<'conn> =
    ProfileService<SqliteProfileRepository<'conn>, SqliteTaskRepository<'conn>>;
pub type Identity<'conn> =
    IdentityService<SqliteProfileRepository<'conn>, SqliteTaskRepository<'conn>>;

pub struct AppContext {
    conn: Connection,
    provider: Arc<dyn IdentityProvider>,
    task_hub: Arc<TaskHub>,
    profile_hub: Arc<ProfileHub>,
    auth_hub: Arc<AuthHub>,
}

impl AppContext {
    /// Opens the configured store; without `database_path` the store lives
    /// in memory.
    pub fn open(config: &AppConfig, provider: Arc<dyn IdentityProvider>) -> DbResult<Self> {
        let conn = match config.database_path.as_deref() {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        info!(
            "event=app_context_open module=app status=ok persistent={}",
            config.database_path.is_some()
        );
        Ok(Self::with_connection(conn, provider))
    }

    pub fn in_memory(provider: Arc<dyn IdentityProvider>) -> DbResult<Self> {
        Ok(Self::with_connection(open_db_in_memory()?, provider))
    }

    pub fn with_connection(conn: Connection, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            conn,
            provider,
            task_hub: TaskHub::new("tasks"),
            profile_hub: ProfileHub::new("profiles"),
            auth_hub: AuthHub::new("auth"),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub fn tasks(&self) -> Tasks<'_> {
        TaskService::with_hub(
            SqliteTaskRepository::new(&self.conn),
            Arc::clone(&self.task_hub),
        )
    }

    pub fn profiles(&self) -> Profiles<'_> {
        ProfileService::with_hub(
            SqliteProfileRepository::new(&self.conn),
            SqliteTaskRepository::new(&self.conn),
            Arc::clone(&self.profile_hub),
        )
    }

    pub fn identity(&self) -> Identity<'_> {
        IdentityService::with_hub(
            Arc::clone(&self.provider),
            self.profiles(),
            Arc::clone(&self.auth_hub),
        )
    }
}
