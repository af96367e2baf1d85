//! Domain records shared by the store, the REST contract, and the client cache.
//!
//! Field names serialize in camelCase to match the JSON wire format.

pub mod comment;
pub mod ids;
pub mod project;
pub mod task;
pub mod user;

pub(crate) mod serde_helpers;

pub use comment::{
    Author, Comment, CommentTree, NewComment, ReactionAction, ReactionAggregate, SortOrder,
    ToggleReactionResponse,
};
pub use ids::{CommentId, LocalId};
pub use project::{Project, ProjectDetail, ProjectInput};
pub use task::{NewTask, Priority, ProjectSummary, Task, TaskDetail, TaskPatch, TaskStatus};
pub use user::User;

use std::fmt;

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}
