use std::fmt;

use crate::model::CommentId;

/// Machine-readable error codes for scripts and API consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unauthorized,
    ConfigParseError,
    NotFound,
    ValidationFailed,
    NestedReply,
    PendingTarget,
    StorageFailure,
    TransportFailure,
    DecodeFailure,
    MutationRolledBack,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Unauthorized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::NotFound => "E2001",
            Self::ValidationFailed => "E2002",
            Self::NestedReply => "E2003",
            Self::PendingTarget => "E2004",
            Self::StorageFailure => "E3001",
            Self::TransportFailure => "E5001",
            Self::DecodeFailure => "E5002",
            Self::MutationRolledBack => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Unauthorized => "Not signed in",
            Self::ConfigParseError => "Config file parse error",
            Self::NotFound => "Resource not found",
            Self::ValidationFailed => "Invalid input",
            Self::NestedReply => "Replies cannot be nested",
            Self::PendingTarget => "Comment not saved yet",
            Self::StorageFailure => "Storage failure",
            Self::TransportFailure => "Network request failed",
            Self::DecodeFailure => "Unexpected response payload",
            Self::MutationRolledBack => "Change was rolled back",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to users.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::Unauthorized => Some("Run `tb login` or pass --session."),
            Self::ConfigParseError => Some("Fix syntax in taskboard/config.toml and retry."),
            Self::NotFound => Some("Check the ids with `tb project list` / `tb task list`."),
            Self::ValidationFailed => None,
            Self::NestedReply => Some("Reply to the top-level comment instead."),
            Self::PendingTarget => Some("Wait for the comment to be saved, then retry."),
            Self::StorageFailure => Some("Check the database path and write permissions."),
            Self::TransportFailure => Some("Check the server URL and network connectivity."),
            Self::DecodeFailure => Some("Make sure client and server versions match."),
            Self::MutationRolledBack => Some("Nothing was saved. Retry the change."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// HTTP status used when this code crosses the REST boundary.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::ValidationFailed | Self::NestedReply | Self::PendingTarget => 400,
            Self::TransportFailure | Self::DecodeFailure => 502,
            Self::ConfigParseError
            | Self::StorageFailure
            | Self::MutationRolledBack
            | Self::InternalUnexpected => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure of a single request against the backend service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Classify a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound(message),
            400 | 422 => Self::BadRequest(message),
            _ => Self::Server { status, message },
        }
    }

    /// HTTP status this error corresponds to, when it came from a response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::NotFound(_) => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::Server { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::BadRequest(_) => ErrorCode::ValidationFailed,
            Self::Server { .. } => ErrorCode::InternalUnexpected,
            Self::Transport(_) => ErrorCode::TransportFailure,
            Self::Decode(_) => ErrorCode::DecodeFailure,
        }
    }
}

/// Why a mutation did not commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// Rejected before any optimistic state was written.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// No session; nothing was applied and no request was sent.
    #[error("not signed in")]
    Unauthenticated,

    /// The target comment only exists locally.
    #[error("comment {0} has not been saved yet")]
    PendingTarget(CommentId),

    /// The request failed and the cache was restored to its snapshot.
    #[error("{message}: {source}")]
    RolledBack {
        message: &'static str,
        #[source]
        source: BackendError,
    },
}

impl MutationError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Invalid(_) => ErrorCode::ValidationFailed,
            Self::Unauthenticated => ErrorCode::Unauthorized,
            Self::PendingTarget(_) => ErrorCode::PendingTarget,
            Self::RolledBack { .. } => ErrorCode::MutationRolledBack,
        }
    }
}
