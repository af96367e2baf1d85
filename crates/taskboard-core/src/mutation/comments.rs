//! Comment, reply and reaction mutations.

use super::{Check, Mutation, OptimisticContext};
use crate::backend::Backend;
use crate::cache::{CacheValue, QueryKey};
use crate::error::{BackendError, MutationError};
use crate::model::{Author, Comment, CommentId, NewComment, SortOrder, ToggleReactionResponse};
use crate::reconcile;

fn optimistic_comment(
    cx: &mut OptimisticContext<'_>,
    task_id: &str,
    parent_id: Option<String>,
    content: &str,
) -> Comment {
    let user = cx.user();
    let author = Author::from(user);
    let user_id = user.id.clone();
    let now = cx.now();
    Comment {
        id: CommentId::pending(cx.allocate_id()),
        content: content.to_string(),
        user: author,
        user_id,
        task_id: task_id.to_string(),
        parent_id,
        created_at: now,
        updated_at: now,
        reactions: Vec::new(),
        replies: Vec::new(),
    }
}

fn cached_tree(current: Option<&CacheValue>) -> Option<&Vec<Comment>> {
    current.and_then(CacheValue::as_comments)
}

/// Post a new top-level comment on a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateComment {
    pub project_id: String,
    pub task_id: String,
    /// Sort order of the comment list being displayed.
    pub sort: SortOrder,
    pub content: String,
}

impl Mutation for CreateComment {
    type Output = Comment;

    const NAME: &'static str = "create_comment";
    const FAILURE_MESSAGE: &'static str = "Failed to create comment";

    fn key(&self) -> QueryKey {
        QueryKey::comments(&self.project_id, &self.task_id, self.sort)
    }

    fn check(&self) -> Result<Check, MutationError> {
        if self.content.trim().is_empty() {
            return Ok(Check::Skip);
        }
        Ok(Check::Proceed)
    }

    fn apply(
        &self,
        current: Option<&CacheValue>,
        cx: &mut OptimisticContext<'_>,
    ) -> Option<CacheValue> {
        let comment = optimistic_comment(cx, &self.task_id, None, self.content.trim());
        let tree = cached_tree(current).map_or(&[][..], Vec::as_slice);
        Some(CacheValue::Comments(reconcile::apply_create_top_level(
            tree, comment, self.sort,
        )))
    }

    fn send(&self, backend: &dyn Backend) -> Result<Comment, BackendError> {
        let body = NewComment {
            content: self.content.trim().to_string(),
            parent_id: None,
        };
        backend.create_comment(&self.project_id, &self.task_id, &body)
    }
}

/// Reply to a top-level comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReply {
    pub project_id: String,
    pub task_id: String,
    pub sort: SortOrder,
    pub parent_id: CommentId,
    pub content: String,
}

impl Mutation for CreateReply {
    type Output = Comment;

    const NAME: &'static str = "create_reply";
    const FAILURE_MESSAGE: &'static str = "Failed to create reply";

    fn key(&self) -> QueryKey {
        QueryKey::comments(&self.project_id, &self.task_id, self.sort)
    }

    fn check(&self) -> Result<Check, MutationError> {
        if self.content.trim().is_empty() {
            return Ok(Check::Skip);
        }
        if self.parent_id.is_pending() {
            return Err(MutationError::PendingTarget(self.parent_id.clone()));
        }
        Ok(Check::Proceed)
    }

    fn apply(
        &self,
        current: Option<&CacheValue>,
        cx: &mut OptimisticContext<'_>,
    ) -> Option<CacheValue> {
        let tree = cached_tree(current)?;
        let parent = self.parent_id.as_persisted().map(str::to_string);
        let reply = optimistic_comment(cx, &self.task_id, parent, self.content.trim());
        Some(CacheValue::Comments(reconcile::apply_create_reply(
            tree,
            &self.parent_id,
            &reply,
        )))
    }

    fn send(&self, backend: &dyn Backend) -> Result<Comment, BackendError> {
        let body = NewComment {
            content: self.content.trim().to_string(),
            parent_id: self.parent_id.as_persisted().map(str::to_string),
        };
        backend.create_comment(&self.project_id, &self.task_id, &body)
    }
}

/// Toggle the session user's emoji reaction on a comment or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleReaction {
    pub project_id: String,
    pub task_id: String,
    pub sort: SortOrder,
    pub comment_id: CommentId,
    pub emoji: String,
}

impl Mutation for ToggleReaction {
    type Output = ToggleReactionResponse;

    const NAME: &'static str = "toggle_reaction";
    const FAILURE_MESSAGE: &'static str = "Failed to toggle reaction";

    fn key(&self) -> QueryKey {
        QueryKey::comments(&self.project_id, &self.task_id, self.sort)
    }

    fn check(&self) -> Result<Check, MutationError> {
        if self.emoji.trim().is_empty() {
            return Err(MutationError::Invalid("emoji is required".to_string()));
        }
        if self.comment_id.is_pending() {
            return Err(MutationError::PendingTarget(self.comment_id.clone()));
        }
        Ok(Check::Proceed)
    }

    fn apply(
        &self,
        current: Option<&CacheValue>,
        cx: &mut OptimisticContext<'_>,
    ) -> Option<CacheValue> {
        let tree = cached_tree(current)?;
        Some(CacheValue::Comments(reconcile::apply_toggle_reaction(
            tree,
            &self.comment_id,
            self.emoji.trim(),
            &cx.user().id,
        )))
    }

    fn send(&self, backend: &dyn Backend) -> Result<ToggleReactionResponse, BackendError> {
        let Some(comment_id) = self.comment_id.as_persisted() else {
            return Err(BackendError::BadRequest(format!(
                "comment {} has not been saved yet",
                self.comment_id
            )));
        };
        backend.toggle_reaction(&self.project_id, &self.task_id, comment_id, self.emoji.trim())
    }
}
