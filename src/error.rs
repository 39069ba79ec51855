/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Failed to start recommendation task: {0}")]
    SubmissionFailed(String),

    #[error("Task polling timed out after {attempts} attempts")]
    PollingTimeout { attempts: u32 },

    #[error("Failed to fetch task status: {0}")]
    PollingTransportError(String),

    #[error("Task failed on the worker: {0}")]
    RemoteTaskError(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Not logged in")]
    Unauthenticated,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Whether this error ends the flow in the timed-out state rather than the failed one
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::PollingTimeout { .. })
    }
}

pub type AppResult<T> = Result<T, AppError>;
