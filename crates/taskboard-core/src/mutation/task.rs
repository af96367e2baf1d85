use super::{Check, Mutation, OptimisticContext};
use crate::backend::Backend;
use crate::cache::{CacheValue, QueryKey};
use crate::error::{BackendError, MutationError};
use crate::model::{Task, TaskPatch};
use crate::reconcile;

/// Edit one or more fields of a task.
///
/// The optimistic merge only happens when the task detail is already
/// cached; the request is sent either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTask {
    pub project_id: String,
    pub task_id: String,
    pub patch: TaskPatch,
}

impl UpdateTask {
    pub fn new(
        project_id: impl Into<String>,
        task_id: impl Into<String>,
        patch: TaskPatch,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            task_id: task_id.into(),
            patch: patch.normalized(),
        }
    }
}

impl Mutation for UpdateTask {
    type Output = Task;

    const NAME: &'static str = "update_task";
    const FAILURE_MESSAGE: &'static str = "Failed to update task";

    fn key(&self) -> QueryKey {
        QueryKey::task(&self.project_id, &self.task_id)
    }

    fn check(&self) -> Result<Check, MutationError> {
        if self.patch.is_empty() {
            return Ok(Check::Skip);
        }
        if self.patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(MutationError::Invalid("Task title is required".to_string()));
        }
        Ok(Check::Proceed)
    }

    fn apply(
        &self,
        current: Option<&CacheValue>,
        _cx: &mut OptimisticContext<'_>,
    ) -> Option<CacheValue> {
        let detail = current.and_then(CacheValue::as_task)?;
        Some(CacheValue::Task(reconcile::apply_task_patch(detail, &self.patch)))
    }

    fn send(&self, backend: &dyn Backend) -> Result<Task, BackendError> {
        backend.update_task(&self.project_id, &self.task_id, &self.patch)
    }
}
