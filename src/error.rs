use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// App-wide error type. Every fallible function returns `Result<T, AppError>`.
///
/// Generation failures (`Upstream`, `MalformedOutput`) are fatal to one
/// pipeline invocation. Runner failures are routine and never surface here:
/// the runner folds them into a normal `RunResponse`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The upstream model call failed (transport error or non-2xx status).
    #[error("Upstream model call failed: {0}")]
    Upstream(String),

    /// Model output contained no parseable JSON object.
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable discriminant for structured responses/logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Upstream(_) => "upstream",
            AppError::MalformedOutput(_) => "malformed_output",
            AppError::Validation(_) => "validation",
            AppError::Io(_) => "io",
            AppError::Serde(_) => "serde",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}
