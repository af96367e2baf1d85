use taskboard_core::error::{BackendError, ErrorCode};

/// Failure of a store operation.
///
/// Messages are the user-facing text sent back to clients, so they stay
/// short and capitalized.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("Replies cannot be nested")]
    NestedReply,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl ServiceError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::NestedReply => ErrorCode::NestedReply,
            Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }

    /// HTTP status reported for this failure.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.code().http_status()
    }
}

impl From<ServiceError> for BackendError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Unauthorized => Self::Unauthorized,
            ServiceError::NotFound(message) => Self::NotFound(message.to_string()),
            ServiceError::Validation(_) | ServiceError::NestedReply => {
                Self::BadRequest(error.to_string())
            }
            ServiceError::Storage(source) => Self::Server {
                status: 500,
                message: source.to_string(),
            },
        }
    }
}
