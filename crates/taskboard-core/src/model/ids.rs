use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-allocated identifier for a comment that exists only in the local
/// cache. Never sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(pub u64);

/// Identity of a comment as seen by the client.
///
/// Optimistic comments carry a [`LocalId`] until the next refetch replaces
/// them with server rows. Anything that must address the server (replying,
/// reacting) requires the `Persisted` form.
///
/// On the wire a persisted id is a bare string; a pending id serializes as
/// `{"pending": <n>}` so the two shapes can never be confused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentId {
    Persisted(String),
    Pending { pending: LocalId },
}

impl CommentId {
    pub fn persisted(id: impl Into<String>) -> Self {
        Self::Persisted(id.into())
    }

    #[must_use]
    pub const fn pending(local: LocalId) -> Self {
        Self::Pending { pending: local }
    }

    /// The server id, if this comment has been saved.
    #[must_use]
    pub fn as_persisted(&self) -> Option<&str> {
        match self {
            Self::Persisted(id) => Some(id),
            Self::Pending { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persisted(id) => f.write_str(id),
            Self::Pending { pending } => write!(f, "pending-{}", pending.0),
        }
    }
}

impl From<&str> for CommentId {
    fn from(id: &str) -> Self {
        Self::Persisted(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{CommentId, LocalId};

    #[test]
    fn persisted_ids_are_bare_strings_on_the_wire() {
        let id = CommentId::persisted("c1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"c1\"");
        let back: CommentId = serde_json::from_str("\"c1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn pending_ids_cannot_be_mistaken_for_server_ids() {
        let id = CommentId::pending(LocalId(7));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"pending":7}"#);
        let back: CommentId = serde_json::from_str(&json).unwrap();
        assert!(back.is_pending());
        assert_eq!(back.as_persisted(), None);

        // A server id that happens to look like a temp id is still persisted.
        let lookalike: CommentId = serde_json::from_str("\"pending-7\"").unwrap();
        assert_eq!(lookalike.as_persisted(), Some("pending-7"));
        assert_ne!(lookalike, id);
    }
}
