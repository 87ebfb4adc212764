//! Centralized error handling module.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-wide error type.
///
/// All errors in the application should be converted to this type
/// for consistent error handling and reporting.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad request error (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized error (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Not found error (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computed delivery instant is not sufficiently in the future (422)
    #[error("Past schedule: {0}")]
    PastSchedule(String),

    /// Cancel/reschedule attempted on a record in a terminal state (409)
    #[error("Already terminal: {0}")]
    AlreadyTerminal(String),

    /// External dispatch facility call failed
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Email transport failed at send time
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::BadRequest(msg) | Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::PastSchedule(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::AlreadyTerminal(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::Dispatch(msg) => {
                tracing::error!("Dispatch error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "Dispatch facility error".to_string(),
                )
            }
            Self::Delivery(msg) => {
                tracing::error!("Delivery error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Email delivery error".to_string(),
                )
            }
            Self::Database(e) => {
                tracing::error!("Database error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
        };

        // Report error to Sentry for server errors
        if status.is_server_error() {
            sentry::capture_error(&self);
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_validation_display() {
        let error = AppError::Validation("deadline is required".to_string());
        assert_eq!(error.to_string(), "Validation error: deadline is required");
    }

    #[test]
    fn test_app_error_past_schedule_display() {
        let error = AppError::PastSchedule("instant already passed".to_string());
        assert_eq!(error.to_string(), "Past schedule: instant already passed");
    }

    #[test]
    fn test_app_error_already_terminal_display() {
        let error = AppError::AlreadyTerminal("record is sent".to_string());
        assert_eq!(error.to_string(), "Already terminal: record is sent");
    }

    #[test]
    fn test_app_error_debug_format() {
        let error = AppError::Dispatch("enqueue failed".to_string());
        let debug_str = format!("{error:?}");
        assert!(debug_str.contains("Dispatch"));
        assert!(debug_str.contains("enqueue failed"));
    }

    #[tokio::test]
    async fn test_validation_into_response() {
        let error = AppError::Validation("missing recipient".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_past_schedule_into_response() {
        let error = AppError::PastSchedule("too late".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_already_terminal_into_response() {
        let error = AppError::AlreadyTerminal("cancelled".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_not_found_into_response() {
        let error = AppError::NotFound("no such notification".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_into_response_hides_detail() {
        use axum::body::to_bytes;

        let error = AppError::Dispatch("token leaked into message".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let body_str = String::from_utf8_lossy(&body);
        assert!(!body_str.contains("token leaked"));
    }

    #[tokio::test]
    async fn test_error_response_is_json() {
        use axum::body::to_bytes;

        let error = AppError::BadRequest("test".to_string());
        let response = error.into_response();

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert!(parsed.get("error").is_some());
    }

    #[tokio::test]
    async fn test_all_error_types_produce_valid_response() {
        let errors: Vec<AppError> = vec![
            AppError::BadRequest("bad".to_string()),
            AppError::Unauthorized("unauth".to_string()),
            AppError::NotFound("not found".to_string()),
            AppError::Validation("invalid".to_string()),
            AppError::PastSchedule("past".to_string()),
            AppError::AlreadyTerminal("terminal".to_string()),
            AppError::Dispatch("dispatch".to_string()),
            AppError::Delivery("delivery".to_string()),
            AppError::Internal("internal".to_string()),
        ];

        for error in errors {
            let response = error.into_response();
            assert!(response.status().is_client_error() || response.status().is_server_error());
        }
    }

    #[test]
    fn test_app_result_ok() {
        let result: AppResult<i32> = Ok(42);
        assert!(result.is_ok());
        assert_eq!(result.ok(), Some(42));
    }
}
