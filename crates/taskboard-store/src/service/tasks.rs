use chrono::NaiveDate;
use rusqlite::{OptionalExtension, Row, params, types::Type};
use taskboard_core::model::{NewTask, ProjectSummary, Task, TaskDetail, TaskPatch, User};

use super::{Store, new_id, parsed, timestamp, validate};
use crate::error::ServiceError;

const TASK_COLUMNS: &str = "t.task_id, t.title, t.description, t.status, t.priority, t.due_date, \
     t.project_id, t.user_id, t.created_at_us, t.updated_at_us";

const DATE_FORMAT: &str = "%Y-%m-%d";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let due_date: Option<String> = row.get(5)?;
    let due_date = due_date
        .map(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parsed(row, 3)?,
        priority: parsed(row, 4)?,
        due_date,
        project_id: row.get(6)?,
        user_id: row.get(7)?,
        created_at: timestamp(row, 8)?,
        updated_at: timestamp(row, 9)?,
    })
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

impl Store {
    /// Tasks of one project, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Project not found` unless `user` owns the project.
    pub fn list_tasks(&self, user: &User, project_id: &str) -> Result<Vec<Task>, ServiceError> {
        self.require_project(&user.id, project_id)?;
        self.tasks_of(project_id)
    }

    /// # Errors
    ///
    /// Returns `Task not found` unless the task is in `project_id` and owned
    /// by `user`.
    pub fn get_task(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
    ) -> Result<TaskDetail, ServiceError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {TASK_COLUMNS}, p.project_id, p.name
                     FROM tasks t JOIN projects p ON p.project_id = t.project_id
                     WHERE t.task_id = ?1 AND t.project_id = ?2 AND p.user_id = ?3"
                ),
                params![task_id, project_id, user.id],
                |row| {
                    Ok(TaskDetail {
                        task: task_from_row(row)?,
                        project: ProjectSummary {
                            id: row.get(10)?,
                            name: row.get(11)?,
                        },
                    })
                },
            )
            .optional()?
            .ok_or(ServiceError::NotFound("Task not found"))
    }

    /// # Errors
    ///
    /// Returns `Project not found` unless `user` owns the project, or a
    /// validation error when the title is blank.
    pub fn create_task(
        &self,
        user: &User,
        project_id: &str,
        task: &NewTask,
    ) -> Result<Task, ServiceError> {
        let title = validate::required(&task.title, "Task title is required")?;
        self.require_project(&user.id, project_id)?;

        let id = new_id();
        let now = self.now_us();
        self.conn.execute(
            "INSERT INTO tasks (task_id, project_id, user_id, title, description, status, priority,
                                due_date, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                id,
                project_id,
                user.id,
                title,
                validate::optional(task.description.as_deref()),
                task.status.as_str(),
                task.priority.as_str(),
                format_date(task.due_date),
                now,
            ],
        )?;
        tracing::info!(task_id = %id, project_id, "created task");
        Ok(self.get_task(user, project_id, &id)?.task)
    }

    /// Apply the present fields of `patch` to a task.
    ///
    /// # Errors
    ///
    /// Returns `Task not found` unless the task is visible to `user`, or a
    /// validation error when the patch sets a blank title.
    pub fn update_task(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<Task, ServiceError> {
        let patch = patch.clone().normalized();
        if patch.title.as_deref().is_some_and(str::is_empty) {
            return Err(ServiceError::invalid("Task title is required"));
        }

        let mut task = self.get_task(user, project_id, task_id)?.task;
        if patch.is_empty() {
            return Ok(task);
        }
        patch.apply_to(&mut task);

        self.conn.execute(
            "UPDATE tasks
             SET title = ?1, description = ?2, status = ?3, priority = ?4, due_date = ?5,
                 updated_at_us = ?6
             WHERE task_id = ?7",
            params![
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                format_date(task.due_date),
                self.now_us(),
                task_id,
            ],
        )?;
        tracing::info!(task_id, "updated task");
        Ok(self.get_task(user, project_id, task_id)?.task)
    }

    /// Delete a task together with its comments and reactions.
    ///
    /// # Errors
    ///
    /// Returns `Task not found` unless the task is visible to `user`.
    pub fn delete_task(
        &self,
        user: &User,
        project_id: &str,
        task_id: &str,
    ) -> Result<(), ServiceError> {
        self.require_task(&user.id, project_id, task_id)?;
        self.conn
            .execute("DELETE FROM tasks WHERE task_id = ?1", [task_id])?;
        tracing::info!(task_id, "deleted task");
        Ok(())
    }

    pub(super) fn tasks_of(&self, project_id: &str) -> Result<Vec<Task>, ServiceError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks t
             WHERE t.project_id = ?1
             ORDER BY t.created_at_us DESC, t.rowid DESC"
        ))?;
        let tasks = stmt
            .query_map([project_id], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }
}
