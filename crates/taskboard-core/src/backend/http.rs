//! REST client for a remote taskboard server.

use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use super::{Backend, routes};
use crate::error::BackendError;
use crate::model::{
    Comment, CommentTree, NewComment, NewTask, Project, ProjectDetail, ProjectInput, SortOrder,
    Task, TaskDetail, TaskPatch, ToggleReactionResponse, User,
};

/// Cookie that carries the session token.
pub const SESSION_COOKIE: &str = "taskboard_session";

/// [`Backend`] over HTTP using a blocking `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    session: Option<String>,
}

#[derive(Deserialize)]
struct SessionBody {
    user: User,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(rename = "statusMessage")]
    status_message: Option<String>,
}

#[derive(Serialize)]
struct ContentBody<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct EmojiBody<'a> {
    emoji: &'a str,
}

impl HttpBackend {
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("taskboard/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    #[must_use]
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = self.url(path);
        debug!(method, %url, "http request");
        let request = self
            .agent
            .request(method, &url)
            .set("Accept", "application/json");
        match &self.session {
            Some(token) => request.set("Cookie", &format!("{SESSION_COOKIE}={token}")),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let response = self.request("GET", path).call().map_err(map_error)?;
        decode(response)
    }

    fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .request(method, path)
            .send_json(body)
            .map_err(map_error)?;
        decode(response)
    }

    fn delete(&self, path: &str) -> Result<(), BackendError> {
        self.request("DELETE", path)
            .call()
            .map(drop)
            .map_err(map_error)
    }
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, BackendError> {
    response
        .into_json::<T>()
        .map_err(|err| BackendError::Decode(err.to_string()))
}

/// Turn a `ureq` failure into the client-facing error taxonomy.
fn map_error(err: ureq::Error) -> BackendError {
    match err {
        ureq::Error::Status(status, response) => {
            let fallback = response.status_text().to_string();
            let message = response
                .into_json::<ErrorBody>()
                .ok()
                .and_then(|body| body.message.or(body.status_message))
                .unwrap_or(fallback);
            BackendError::from_status(status, message)
        }
        ureq::Error::Transport(transport) => BackendError::Transport(transport.to_string()),
    }
}

impl Backend for HttpBackend {
    fn current_user(&self) -> Result<User, BackendError> {
        let session: Option<SessionBody> = self.get_json(routes::SESSION)?;
        session.map(|s| s.user).ok_or(BackendError::Unauthorized)
    }

    fn list_projects(&self) -> Result<Vec<Project>, BackendError> {
        self.get_json(routes::PROJECTS)
    }

    fn get_project(&self, project_id: &str) -> Result<ProjectDetail, BackendError> {
        self.get_json(&routes::project(project_id))
    }

    fn create_project(&self, input: &ProjectInput) -> Result<Project, BackendError> {
        self.send_json("POST", routes::PROJECTS, input)
    }

    fn update_project(
        &self,
        project_id: &str,
        input: &ProjectInput,
    ) -> Result<Project, BackendError> {
        self.send_json("PUT", &routes::project(project_id), input)
    }

    fn delete_project(&self, project_id: &str) -> Result<(), BackendError> {
        self.delete(&routes::project(project_id))
    }

    fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>, BackendError> {
        self.get_json(&routes::project_tasks(project_id))
    }

    fn get_task(&self, project_id: &str, task_id: &str) -> Result<TaskDetail, BackendError> {
        self.get_json(&routes::task(project_id, task_id))
    }

    fn create_task(&self, project_id: &str, task: &NewTask) -> Result<Task, BackendError> {
        self.send_json("POST", &routes::project_tasks(project_id), task)
    }

    fn update_task(
        &self,
        project_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<Task, BackendError> {
        self.send_json("PUT", &routes::task(project_id, task_id), patch)
    }

    fn delete_task(&self, project_id: &str, task_id: &str) -> Result<(), BackendError> {
        self.delete(&routes::task(project_id, task_id))
    }

    fn list_comments(
        &self,
        project_id: &str,
        task_id: &str,
        sort: SortOrder,
    ) -> Result<CommentTree, BackendError> {
        self.get_json(&routes::task_comments_sorted(project_id, task_id, sort))
    }

    fn create_comment(
        &self,
        project_id: &str,
        task_id: &str,
        comment: &NewComment,
    ) -> Result<Comment, BackendError> {
        self.send_json("POST", &routes::task_comments(project_id, task_id), comment)
    }

    fn update_comment(
        &self,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<Comment, BackendError> {
        self.send_json(
            "PUT",
            &routes::task_comment(project_id, task_id, comment_id),
            &ContentBody { content },
        )
    }

    fn delete_comment(
        &self,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
    ) -> Result<(), BackendError> {
        self.delete(&routes::task_comment(project_id, task_id, comment_id))
    }

    fn toggle_reaction(
        &self,
        project_id: &str,
        task_id: &str,
        comment_id: &str,
        emoji: &str,
    ) -> Result<ToggleReactionResponse, BackendError> {
        self.send_json(
            "POST",
            &routes::comment_reactions(project_id, task_id, comment_id),
            &EmojiBody { emoji },
        )
    }
}
