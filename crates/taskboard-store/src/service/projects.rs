use rusqlite::{OptionalExtension, Row, params};
use taskboard_core::model::{Project, ProjectDetail, ProjectInput, User};

use super::{Store, new_id, timestamp, validate};
use crate::error::ServiceError;

const PROJECT_COLUMNS: &str =
    "project_id, name, description, user_id, created_at_us, updated_at_us";

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        user_id: row.get(3)?,
        created_at: timestamp(row, 4)?,
        updated_at: timestamp(row, 5)?,
    })
}

fn validated(input: &ProjectInput) -> Result<ProjectInput, ServiceError> {
    Ok(ProjectInput {
        name: validate::required(&input.name, "Project name is required")?,
        description: validate::optional(input.description.as_deref()),
    })
}

impl Store {
    /// Projects owned by `user`, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_projects(&self, user: &User) -> Result<Vec<Project>, ServiceError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects
             WHERE user_id = ?1
             ORDER BY updated_at_us DESC, rowid DESC"
        ))?;
        let projects = stmt
            .query_map([&user.id], project_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(projects)
    }

    /// One project with its tasks, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Project not found` unless `user` owns the project.
    pub fn get_project(
        &self,
        user: &User,
        project_id: &str,
    ) -> Result<ProjectDetail, ServiceError> {
        let project = self.find_project(user, project_id)?;
        let tasks = self.tasks_of(project_id)?;
        Ok(ProjectDetail { project, tasks })
    }

    /// # Errors
    ///
    /// Fails validation when the name is blank.
    pub fn create_project(
        &self,
        user: &User,
        input: &ProjectInput,
    ) -> Result<Project, ServiceError> {
        let input = validated(input)?;
        let now = self.now_us();
        let id = new_id();
        self.conn.execute(
            "INSERT INTO projects (project_id, name, description, user_id, created_at_us, updated_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, input.name, input.description, user.id, now],
        )?;
        tracing::info!(project_id = %id, "created project");
        self.find_project(user, &id)
    }

    /// Replace the editable fields of a project.
    ///
    /// # Errors
    ///
    /// Returns `Project not found` unless `user` owns the project, or a
    /// validation error when the name is blank.
    pub fn update_project(
        &self,
        user: &User,
        project_id: &str,
        input: &ProjectInput,
    ) -> Result<Project, ServiceError> {
        let input = validated(input)?;
        self.require_project(&user.id, project_id)?;
        self.conn.execute(
            "UPDATE projects SET name = ?1, description = ?2, updated_at_us = ?3
             WHERE project_id = ?4",
            params![input.name, input.description, self.now_us(), project_id],
        )?;
        tracing::info!(project_id, "updated project");
        self.find_project(user, project_id)
    }

    /// Delete a project together with its tasks, comments and reactions.
    ///
    /// # Errors
    ///
    /// Returns `Project not found` unless `user` owns the project.
    pub fn delete_project(&self, user: &User, project_id: &str) -> Result<(), ServiceError> {
        self.require_project(&user.id, project_id)?;
        self.conn
            .execute("DELETE FROM projects WHERE project_id = ?1", [project_id])?;
        tracing::info!(project_id, "deleted project");
        Ok(())
    }

    fn find_project(&self, user: &User, project_id: &str) -> Result<Project, ServiceError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = ?1 AND user_id = ?2"
                ),
                params![project_id, user.id],
                project_from_row,
            )
            .optional()?
            .ok_or(ServiceError::NotFound("Project not found"))
    }
}
