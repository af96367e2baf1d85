//! The authoritative CRUD service as seen by the client.
//!
//! [`Backend`] is the contract the mutation executor writes through and the
//! query cache reads through. Two implementations exist: [`http::HttpBackend`]
//! talks to a remote server over REST, and `taskboard-store` provides an
//! in-process implementation on top of SQLite.
//!
//! Every call acts on behalf of one authenticated session. Implementations
//! fail with [`BackendError::Unauthorized`] when the session is missing or
//! expired and [`BackendError::NotFound`] when the resource is absent or
//! owned by someone else, without changing any stored state.

pub mod http;
pub mod routes;

pub use http::HttpBackend;

use crate::error::BackendError;
use crate::model::{
    Comment, CommentTree, NewComment, NewTask, Project, ProjectDetail, ProjectInput, SortOrder,
    Task, TaskDetail, TaskPatch, ToggleReactionResponse, User,
};

pub trait Backend {
    /// The user the session belongs to.
    fn current_user(&self) -> Result<User, BackendError>;

    // Projects

    /// Projects owned by the session user, most recently updated first.
    fn list_projects(&self) -> Result<Vec<Project>, BackendError>;
    fn get_project(&self, project_id: &str) -> Result<ProjectDetail, BackendError>;
    fn create_project(&self, input: &ProjectInput) -> Result<Project, BackendError>;
    fn update_project(&self, project_id: &str, input: &ProjectInput)
    -> Result<Project, BackendError>;
    fn delete_project(&self, project_id: &str) -> Result<(), BackendError>;

    // Tasks

    /// Tasks of one project, newest first.
    fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>, BackendError>;
    fn get_task(&self, project_id: &str, task_id: &str) -> Result<TaskDetail, BackendError>;
    fn create_task(&self, project_id: &str, task: &NewTask) -> Result<Task, BackendError>;
    fn update_task(
        &self,
        project_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<Task, BackendError>;
    fn delete_task(&self, project_id: &str, task_id: &str) -> Result<(), BackendError>;

    // Comments

    /// Top-level comments in `sort` order, each with its replies (newest
    /// first) and reaction aggregates for the session user.
    fn list_comments(
        &self,
        project_id: &str,
        task_id: &str,
        sort: SortOrder,
    ) -> Result<CommentTree, BackendError>;
    fn create_comment(
        &self,
        project_id: &str,
        task_id: &str,
        comment: &NewComment,
    ) -> Result<Comment, BackendError>;
    fn update_comment(
        &self,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<Comment, BackendError>;
    fn delete_comment(
        &self,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
    ) -> Result<(), BackendError>;

    /// Add the session user's `emoji` reaction if absent, remove it if
    /// present.
    fn toggle_reaction(
        &self,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
        emoji: &str,
    ) -> Result<ToggleReactionResponse, BackendError>;
}
