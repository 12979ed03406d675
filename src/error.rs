use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent JSON error bodies.
/// Background image-job errors never pass through here; they are caught
/// and logged inside the processor.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed upload: bad multipart shape, wrong content type, or a
    /// CSV that fails schema validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A lookup by external id returned nothing.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure reading the multipart request body.
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::NotFound { entity, id } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} {id} not found"),
            ),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::Multipart(err) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Malformed multipart request: {err}"),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Constraint violations and everything else map to 500 with a
///   sanitized message; the triggering transaction has already rolled
///   back by the time the error reaches a handler.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            tracing::error!(error = %db_err, "Database error");
            let code = match db_err.kind() {
                sqlx::error::ErrorKind::ForeignKeyViolation => "CONSTRAINT_ERROR",
                sqlx::error::ErrorKind::UniqueViolation => "CONSTRAINT_ERROR",
                _ => "STORAGE_ERROR",
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                code,
                "Storage failure".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Storage failure".to_string(),
            )
        }
    }
}
