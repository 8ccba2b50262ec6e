//! Domain error types for the push sync store.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The request never produced a response
    #[error("Backend request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status
    #[error("Backend returned {status} for {url}")]
    Status { status: u16, url: String },

    /// The backend answered with something we could not decode
    #[error("Invalid backend payload: {0}")]
    Decode(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Fixture file could not be read
    #[error("Fixture error: {0}")]
    Fixture(String),

    /// The operation was superseded or the service is shutting down
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl AppError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Transport(_) => true,
            AppError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return AppError::Decode(err.to_string());
        }
        match (err.status(), err.url()) {
            (Some(status), Some(url)) => AppError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            },
            _ => AppError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decode(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Fixture(err.to_string())
    }
}
