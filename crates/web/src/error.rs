use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use storage::{
    dto::common::ErrorResponse,
    error::{LeaderboardError, StorageError},
};
use validator::ValidationErrors;

/// Web layer errors
#[derive(Debug)]
pub enum WebError {
    Storage(StorageError),
    Leaderboard(LeaderboardError),
    Validation(ValidationErrors),
    BadRequest(String),
    InternalServerError(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "Storage error: {}", e),
            Self::Leaderboard(e) => write!(f, "Leaderboard error: {}", e),
            Self::Validation(e) => write!(f, "Validation error: {}", e),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::InternalServerError(msg) => write!(f, "Internal server error: {}", msg),
        }
    }
}

impl std::error::Error for WebError {}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            Self::Storage(StorageError::ConstraintViolation(_)) => StatusCode::CONFLICT,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Leaderboard(LeaderboardError::CompetitorNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Leaderboard(LeaderboardError::EmptyRoster) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            Self::Storage(StorageError::ConstraintViolation(msg)) => error_body(msg),
            Self::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                error_body("An internal error occurred")
            }
            Self::Leaderboard(e @ LeaderboardError::CompetitorNotFound(_)) => {
                error_body(&e.to_string())
            }
            Self::Leaderboard(e) => {
                tracing::error!("Leaderboard error: {}", e);
                error_body("An internal error occurred")
            }
            Self::Validation(errors) => {
                let mut details: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .flat_map(|(field, errors)| {
                        errors.iter().map(move |e| {
                            format!(
                                "{}: {}",
                                field,
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| e.code.to_string())
                            )
                        })
                    })
                    .collect();
                details.sort();

                ErrorResponse {
                    error: "Validation failed".to_string(),
                    details,
                }
            }
            Self::BadRequest(msg) => error_body(msg),
            Self::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                error_body("An internal error occurred")
            }
        };

        (status_code, Json(body)).into_response()
    }
}

fn error_body(message: &str) -> ErrorResponse {
    ErrorResponse {
        error: message.to_string(),
        details: Vec::new(),
    }
}

impl From<StorageError> for WebError {
    fn from(error: StorageError) -> Self {
        Self::Storage(error)
    }
}

impl From<LeaderboardError> for WebError {
    fn from(error: LeaderboardError) -> Self {
        Self::Leaderboard(error)
    }
}

impl From<ValidationErrors> for WebError {
    fn from(error: ValidationErrors) -> Self {
        Self::Validation(error)
    }
}

impl From<serde_json::Error> for WebError {
    fn from(error: serde_json::Error) -> Self {
        Self::InternalServerError(error.to_string())
    }
}

pub type WebResult<T> = Result<T, WebError>;
