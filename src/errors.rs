use axum::http::StatusCode;
use thiserror::Error;

/// Failures raised by the sync, storage and metrics layers.
///
/// None of these are fatal to the process: the sync path logs them and
/// degrades the sync status, and the HTTP layer turns them into `AppError`.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("local cache is malformed: {0}")]
    MalformedLocalCache(String),
    #[error("invalid import: {0}")]
    MalformedImport(String),
    #[error("invalid numeric input: {0:?}")]
    InvalidNumericInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("seed dataset unavailable: {0}")]
    SeedUnavailable(String),
    #[error("asset unavailable: {0}")]
    AssetUnavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HealthError {
    pub fn remote(err: impl std::fmt::Display) -> Self {
        Self::RemoteUnavailable(err.to_string())
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<HealthError> for AppError {
    fn from(err: HealthError) -> Self {
        match err {
            HealthError::MalformedImport(_)
            | HealthError::InvalidNumericInput(_)
            | HealthError::InvalidConfig(_) => Self::bad_request(err.to_string()),
            other => Self::internal(other),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
