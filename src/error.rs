use axum::http::StatusCode;
use axum::Json;

use crate::memory::MAX_CONTENT_CHARS;

#[derive(Debug, thiserror::Error)]
pub enum BusyError {
    #[error("Content is required and must be a string")]
    EmptyContent,

    #[error("Content must not exceed {} characters", MAX_CONTENT_CHARS)]
    ContentTooLong,

    #[error("Invalid memory ID: {0}")]
    InvalidId(String),

    #[error("{0}")]
    Validation(String),

    #[error("Memory not found or unauthorized")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("storage fault: {0}")]
    StorageFault(String),

    #[error("chat model error: {0}")]
    Llm(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BusyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Embedding(_)
            | Self::StorageFault(_)
            | Self::Llm(_)
            | Self::Database(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Failures of an external system or the store. Their messages never
    /// reach HTTP clients.
    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl axum::response::IntoResponse for BusyError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let message = if self.is_internal() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_request() {
        assert_eq!(BusyError::EmptyContent.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(BusyError::ContentTooLong.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            BusyError::InvalidId("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn external_failures_are_internal() {
        assert!(BusyError::Embedding("down".into()).is_internal());
        assert!(BusyError::StorageFault("nan".into()).is_internal());
        assert!(!BusyError::NotFound.is_internal());
        assert_eq!(BusyError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn content_too_long_names_the_cap() {
        assert_eq!(
            BusyError::ContentTooLong.to_string(),
            "Content must not exceed 8000 characters"
        );
    }
}
