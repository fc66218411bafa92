use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

/// Failure of a single source adapter invocation. Absorbed by the reconciler,
/// never surfaced as an overall failure.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    Response(String),

    #[error("timed out after {0}ms")]
    Timeout(u128),

    #[error("adapter panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("No valid stores selected or available for search.")]
    NoValidSources,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Orchestration error: {0}")]
    Orchestration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True when the error came from a unique constraint on insert.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::NoValidSources => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NoValidSources.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("listing 3".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("dup".into()).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn orchestration_is_a_server_error() {
        let err = AppError::Orchestration("runtime shutting down".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_unique_violation());
    }
}
