use uuid::Uuid;

use crate::models::attempt::AttemptStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Attempt limit exceeded: at most {max_attempts} attempt(s) allowed")]
    AttemptLimitExceeded { max_attempts: u32 },

    #[error("Retry not allowed: quiz has already been completed")]
    RetryNotAllowed,

    #[error("An attempt for this quiz is already in progress")]
    AttemptAlreadyInProgress,

    #[error("Invalid attempt state: attempt is {status}")]
    InvalidAttemptState { status: AttemptStatus },

    #[error("Malformed answer for question {question_id}: {reason}")]
    MalformedAnswer { question_id: Uuid, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Expected rejections a caller surfaces as-is, as opposed to faults.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Error::AttemptLimitExceeded { .. }
                | Error::RetryNotAllowed
                | Error::AttemptAlreadyInProgress
                | Error::InvalidAttemptState { .. }
                | Error::MalformedAnswer { .. }
        )
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
