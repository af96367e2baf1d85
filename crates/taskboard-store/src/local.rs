//! In-process [`Backend`] over a [`Store`].
//!
//! Lets the CLI run the optimistic mutation executor against a local
//! database with exactly the error semantics a remote server would have.

use taskboard_core::backend::Backend;
use taskboard_core::error::BackendError;
use taskboard_core::model::{
    Comment, CommentTree, NewComment, NewTask, Project, ProjectDetail, ProjectInput, SortOrder,
    Task, TaskDetail, TaskPatch, ToggleReactionResponse, User,
};

use crate::service::Store;

/// A store plus the session token the calls are made with.
#[derive(Debug)]
pub struct LocalBackend<'a> {
    store: &'a Store,
    token: Option<String>,
}

impl<'a> LocalBackend<'a> {
    #[must_use]
    pub const fn new(store: &'a Store, token: Option<String>) -> Self {
        Self { store, token }
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        self.store
    }

    fn user(&self) -> Result<User, BackendError> {
        let token = self.token.as_deref().ok_or(BackendError::Unauthorized)?;
        Ok(self.store.authenticate(token)?)
    }
}

impl Backend for LocalBackend<'_> {
    fn current_user(&self) -> Result<User, BackendError> {
        self.user()
    }

    fn list_projects(&self) -> Result<Vec<Project>, BackendError> {
        Ok(self.store.list_projects(&self.user()?)?)
    }

    fn get_project(&self, project_id: &str) -> Result<ProjectDetail, BackendError> {
        Ok(self.store.get_project(&self.user()?, project_id)?)
    }

    fn create_project(&self, input: &ProjectInput) -> Result<Project, BackendError> {
        Ok(self.store.create_project(&self.user()?, input)?)
    }

    fn update_project(
        &self,
        project_id: &str,
        input: &ProjectInput,
    ) -> Result<Project, BackendError> {
        Ok(self.store.update_project(&self.user()?, project_id, input)?)
    }

    fn delete_project(&self, project_id: &str) -> Result<(), BackendError> {
        Ok(self.store.delete_project(&self.user()?, project_id)?)
    }

    fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>, BackendError> {
        Ok(self.store.list_tasks(&self.user()?, project_id)?)
    }

    fn get_task(&self, project_id: &str, task_id: &str) -> Result<TaskDetail, BackendError> {
        Ok(self.store.get_task(&self.user()?, project_id, task_id)?)
    }

    fn create_task(&self, project_id: &str, task: &NewTask) -> Result<Task, BackendError> {
        Ok(self.store.create_task(&self.user()?, project_id, task)?)
    }

    fn update_task(
        &self,
        project_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<Task, BackendError> {
        Ok(self
            .store
            .update_task(&self.user()?, project_id, task_id, patch)?)
    }

    fn delete_task(&self, project_id: &str, task_id: &str) -> Result<(), BackendError> {
        Ok(self.store.delete_task(&self.user()?, project_id, task_id)?)
    }

    fn list_comments(
        &self,
        project_id: &str,
        task_id: &str,
        sort: SortOrder,
    ) -> Result<CommentTree, BackendError> {
        Ok(self
            .store
            .list_comments(&self.user()?, project_id, task_id, sort)?)
    }

    fn create_comment(
        &self,
        project_id: &str,
        task_id: &str,
        comment: &NewComment,
    ) -> Result<Comment, BackendError> {
        Ok(self
            .store
            .create_comment(&self.user()?, project_id, task_id, comment)?)
    }

    fn update_comment(
        &self,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<Comment, BackendError> {
        Ok(self
            .store
            .update_comment(&self.user()?, project_id, task_id, comment_id, content)?)
    }

    fn delete_comment(
        &self,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
    ) -> Result<(), BackendError> {
        Ok(self
            .store
            .delete_comment(&self.user()?, project_id, task_id, comment_id)?)
    }

    fn toggle_reaction(
        &self,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
        emoji: &str,
    ) -> Result<ToggleReactionResponse, BackendError> {
        Ok(self
            .store
            .toggle_reaction(&self.user()?, project_id, task_id, comment_id, emoji)?)
    }
}

#[cfg(test)]
mod tests {
    use super::LocalBackend;
    use crate::service::test_support::store;
    use taskboard_core::backend::Backend;
    use taskboard_core::error::BackendError;
    use taskboard_core::model::ProjectInput;

    #[test]
    fn missing_or_bad_token_is_unauthorized() {
        let store = store();
        assert_eq!(
            LocalBackend::new(&store, None).list_projects(),
            Err(BackendError::Unauthorized)
        );
        assert_eq!(
            LocalBackend::new(&store, Some("nope".into())).current_user(),
            Err(BackendError::Unauthorized)
        );
    }

    #[test]
    fn calls_act_for_the_session_user() {
        let store = store();
        let (ada, token) = store.register("Ada", "ada@example.com").expect("register");
        let backend = LocalBackend::new(&store, Some(token));

        assert_eq!(backend.current_user().expect("whoami"), ada);
        let project = backend
            .create_project(&ProjectInput {
                name: "Roadmap".into(),
                description: None,
            })
            .expect("create");
        assert_eq!(project.user_id, ada.id);
        assert!(matches!(
            backend.get_project("missing"),
            Err(BackendError::NotFound(m)) if m == "Project not found"
        ));
    }
}
