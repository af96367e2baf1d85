//! Local query cache.
//!
//! Maps a [`QueryKey`] to the last known server value for that view. The
//! cache is an explicit value owned by a [`crate::mutation::MutationExecutor`]
//! for the lifetime of one session; nothing here is global.
//!
//! # Module layout
//!
//! - [`store`]: [`QueryCache`], entry staleness, fetch tickets and the
//!   per-key mutation sequence.
//! - [`QueryKey`] / [`CacheValue`]: identities and cached payloads (this module).

pub mod store;

pub use store::{FetchOutcome, FetchTicket, QueryCache};

use std::fmt;

use crate::backend::Backend;
use crate::error::BackendError;
use crate::model::{CommentTree, SortOrder, TaskDetail};

/// Identity of one cached server view.
///
/// Comment lists that differ only in sort order are separate entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Comments {
        project_id: String,
        task_id: String,
        sort: SortOrder,
    },
    Task {
        project_id: String,
        task_id: String,
    },
}

impl QueryKey {
    pub fn comments(
        project_id: impl Into<String>,
        task_id: impl Into<String>,
        sort: SortOrder,
    ) -> Self {
        Self::Comments {
            project_id: project_id.into(),
            task_id: task_id.into(),
            sort,
        }
    }

    pub fn task(project_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self::Task {
            project_id: project_id.into(),
            task_id: task_id.into(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comments {
                project_id,
                task_id,
                sort,
            } => write!(f, "comments/{project_id}/{task_id}/{sort}"),
            Self::Task {
                project_id,
                task_id,
            } => write!(f, "task/{project_id}/{task_id}"),
        }
    }
}

/// Payload stored under a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Comments(CommentTree),
    Task(TaskDetail),
}

impl CacheValue {
    #[must_use]
    pub fn as_comments(&self) -> Option<&CommentTree> {
        match self {
            Self::Comments(tree) => Some(tree),
            Self::Task(_) => None,
        }
    }

    #[must_use]
    pub const fn as_task(&self) -> Option<&TaskDetail> {
        match self {
            Self::Task(detail) => Some(detail),
            Self::Comments(_) => None,
        }
    }
}

/// Load the authoritative value for `key` from the backend.
///
/// # Errors
///
/// Returns whatever the backend reports for the underlying read.
pub fn fetch_query(backend: &dyn Backend, key: &QueryKey) -> Result<CacheValue, BackendError> {
    match key {
        QueryKey::Comments {
            project_id,
            task_id,
            sort,
        } => backend
            .list_comments(project_id, task_id, *sort)
            .map(CacheValue::Comments),
        QueryKey::Task {
            project_id,
            task_id,
        } => backend.get_task(project_id, task_id).map(CacheValue::Task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_order_is_part_of_identity() {
        let asc = QueryKey::comments("p1", "t1", SortOrder::Asc);
        let desc = QueryKey::comments("p1", "t1", SortOrder::Desc);
        assert_ne!(asc, desc);
        assert_eq!(asc.to_string(), "comments/p1/t1/asc");
        assert_eq!(QueryKey::task("p1", "t1").to_string(), "task/p1/t1");
    }

    #[test]
    fn value_accessors_match_variant() {
        let value = CacheValue::Comments(Vec::new());
        assert!(value.as_comments().is_some());
        assert!(value.as_task().is_none());
    }
}
