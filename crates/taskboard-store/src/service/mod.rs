//! Ownership-checked operations over the SQLite store.
//!
//! Every operation acts for one authenticated [`User`]. A resource that is
//! missing and a resource owned by someone else are indistinguishable to the
//! caller: both fail with [`ServiceError::NotFound`].

mod auth;
mod comments;
mod projects;
mod reactions;
mod tasks;
mod validate;

pub use reactions::{ReactionRow, aggregate_reactions};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use std::{path::Path, str::FromStr};
use taskboard_core::clock::{Clock, SystemClock};
use taskboard_core::model::User;

use crate::db;
use crate::error::ServiceError;

/// Handle on an open, migrated store.
pub struct Store {
    conn: Connection,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open the store at `path`, creating and migrating it as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(db::open_store(path)?))
    }

    /// # Errors
    ///
    /// Returns an error if migrating the in-memory database fails.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    /// Wrap an already migrated connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            clock: Box::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn now_us(&self) -> i64 {
        self.clock.now().timestamp_micros()
    }

    /// Fail with `Project not found` unless `user_id` owns `project_id`.
    fn require_project(&self, user_id: &str, project_id: &str) -> Result<(), ServiceError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM projects WHERE project_id = ?1 AND user_id = ?2",
                params![project_id, user_id],
                |_| Ok(()),
            )
            .optional()?;
        found.ok_or(ServiceError::NotFound("Project not found"))
    }

    /// Fail with `Task not found` unless the task exists in `project_id` and
    /// belongs to `user_id`.
    fn require_task(
        &self,
        user_id: &str,
        project_id: &str,
        task_id: &str,
    ) -> Result<(), ServiceError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM tasks t
                 JOIN projects p ON p.project_id = t.project_id
                 WHERE t.task_id = ?1 AND t.project_id = ?2 AND p.user_id = ?3",
                params![task_id, project_id, user_id],
                |_| Ok(()),
            )
            .optional()?;
        found.ok_or(ServiceError::NotFound("Task not found"))
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let us: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(us).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {us}").into(),
        )
    })
}

/// Parse a text column with `FromStr`, reporting failures as conversion
/// errors on that column.
pub(crate) fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn user_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(start)?,
        name: row.get(start + 1)?,
        email: row.get(start + 2)?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Store;
    use chrono::{Duration, TimeZone, Utc};
    use taskboard_core::clock::ManualClock;
    use taskboard_core::model::{NewTask, ProjectInput, User};

    /// In-memory store on a clock that ticks one second per reading.
    pub fn store() -> Store {
        let start = Utc
            .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
            .single()
            .expect("valid start time");
        Store::open_in_memory()
            .expect("open in-memory store")
            .with_clock(ManualClock::ticking(start, Duration::seconds(1)))
    }

    pub fn user(store: &Store, name: &str) -> User {
        let (user, _token) = store
            .register(name, &format!("{}@example.com", name.to_lowercase()))
            .expect("register user");
        user
    }

    /// A user owning one project with one task: `(user, project_id, task_id)`.
    pub fn task(store: &Store) -> (User, String, String) {
        let owner = user(store, "Ada");
        let project = store
            .create_project(
                &owner,
                &ProjectInput {
                    name: "Roadmap".into(),
                    description: None,
                },
            )
            .expect("create project");
        let task = store
            .create_task(&owner, &project.id, &NewTask::titled("Ship it"))
            .expect("create task");
        (owner, project.id, task.id)
    }
}
