use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{CommentId, ParseEnumError, User};

/// Public identity of a comment's author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.display_name(),
            email: user.email.clone(),
        }
    }
}

/// Per-emoji summary of the reaction rows on one comment, relative to the
/// user who requested it.
///
/// `count` is always at least 1: an aggregate that would drop to zero is
/// removed instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionAggregate {
    pub emoji: String,
    pub count: u32,
    pub user_reacted: bool,
}

/// A comment on a task.
///
/// Top-level comments (`parent_id == None`) carry their direct replies in
/// `replies`; replies never carry replies of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub user: Author,
    pub user_id: String,
    pub task_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub reactions: Vec<ReactionAggregate>,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

impl Comment {
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    #[must_use]
    pub fn reaction(&self, emoji: &str) -> Option<&ReactionAggregate> {
        self.reactions.iter().find(|r| r.emoji == emoji)
    }
}

/// One cached comment list: top-level comments in display order.
pub type CommentTree = Vec<Comment>;

/// Body of a create-comment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// What a reaction toggle did on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Added,
    Removed,
}

impl ReactionAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleReactionResponse {
    pub action: ReactionAction,
}

/// Display order of top-level comments by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first.
    Asc,
    /// Newest first.
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "oldest" => Ok(Self::Asc),
            "desc" | "newest" => Ok(Self::Desc),
            _ => Err(ParseEnumError {
                expected: "sort order (asc|desc)",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_json_uses_camel_case_and_defaults() {
        let json = r#"{
            "id": "c1",
            "content": "hello",
            "user": {"id": "u1", "name": "Ada", "email": "ada@example.com"},
            "userId": "u1",
            "taskId": "t1",
            "parentId": null,
            "createdAt": "2025-01-02T03:04:05Z",
            "updatedAt": "2025-01-02T03:04:05Z",
            "reactions": [{"emoji": "👍", "count": 2, "userReacted": true}]
        }"#;

        let comment: Comment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.id, CommentId::persisted("c1"));
        assert!(comment.is_top_level());
        assert!(comment.replies.is_empty());
        assert_eq!(comment.reaction("👍").map(|r| r.count), Some(2));

        let out = serde_json::to_value(&comment).unwrap();
        assert_eq!(out["reactions"][0]["userReacted"], true);
        assert_eq!(out["taskId"], "t1");
    }

    #[test]
    fn new_comment_omits_missing_parent() {
        let body = NewComment {
            content: "hi".into(),
            parent_id: None,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"content":"hi"}"#);

        let reply = NewComment {
            content: "hi".into(),
            parent_id: Some("c1".into()),
        };
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"content":"hi","parentId":"c1"}"#
        );
    }

    #[test]
    fn sort_order_parse_aliases() {
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!(" DESC ".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert_eq!("oldest".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::default(), SortOrder::Desc);
    }

    #[test]
    fn reaction_action_wire_format() {
        let resp: ToggleReactionResponse = serde_json::from_str(r#"{"action":"removed"}"#).unwrap();
        assert_eq!(resp.action, ReactionAction::Removed);
        assert_eq!(ReactionAction::Added.as_str(), "added");
    }
}
