use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Remote error {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("View was torn down")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// How the engine treats a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any network call.
    Precondition,
    /// Remote or network failure; optimistic state is rolled back.
    Transient,
    /// Broken data contract (unknown id, duplicate day, overlapping mutation).
    Invariant,
    /// The owning view is gone; nothing is applied.
    Cancelled,
}

impl AppError {
    /// Maps a non-2xx response from the remote API.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => AppError::Unauthorized,
            StatusCode::FORBIDDEN => AppError::Forbidden(body),
            StatusCode::NOT_FOUND => AppError::NotFound(body),
            StatusCode::CONFLICT => AppError::Conflict(body),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                AppError::Validation(body)
            }
            _ => AppError::Remote {
                status: status.as_u16(),
                message: body,
            },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Unauthorized | AppError::Forbidden(_) | AppError::Validation(_) => {
                ErrorClass::Precondition
            }
            AppError::NotFound(_) | AppError::Conflict(_) => ErrorClass::Invariant,
            AppError::Remote { .. } | AppError::Transport(_) | AppError::Internal(_) => {
                ErrorClass::Transient
            }
            AppError::Cancelled => ErrorClass::Cancelled,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
