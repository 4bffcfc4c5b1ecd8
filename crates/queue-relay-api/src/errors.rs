//! Error types for the HTTP service

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use queue_relay_core::{InvalidCorrelationId, ProcessingError};
use queue_relay_runtime::{QueueError, ValidationError};
use tracing::{error, warn};

/// Handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: the request names an invalid queue or value
/// - `404 Not Found`: the queue does not exist
/// - `500 Internal Server Error`: the request body or query could not be
///   read, or message processing failed
/// - `502 Bad Gateway`: the queue service rejected the operation
/// - `503 Service Unavailable`: the queue service failed transiently; the
///   response carries `Retry-After`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed JSON or missing required fields
    #[error("Invalid request body: {message}")]
    InvalidBody { message: String },

    /// Query parameters that cannot be parsed
    #[error("Invalid query parameters: {message}")]
    InvalidQuery { message: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid correlation id: {0}")]
    CorrelationId(#[from] InvalidCorrelationId),

    #[error("Queue operation failed: {0}")]
    Queue(#[from] QueueError),

    #[error("Message processing failed: {0}")]
    Processing(ProcessingError),
}

impl From<ProcessingError> for ApiError {
    fn from(error: ProcessingError) -> Self {
        // Queue failures keep their own status mapping
        match error {
            ProcessingError::Queue(queue_error) => ApiError::Queue(queue_error),
            other => ApiError::Processing(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody {
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidQuery {
            message: rejection.body_text(),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody { .. } | Self::InvalidQuery { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Validation(_) | Self::CorrelationId(_) => StatusCode::BAD_REQUEST,
            Self::Queue(e) => queue_status(e),
            Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::Queue(e) if e.is_transient() => e.retry_after().map(|d| d.as_secs().max(1)),
            _ => None,
        }
    }
}

fn queue_status(error: &QueueError) -> StatusCode {
    match error {
        QueueError::QueueNotFound { .. } => StatusCode::NOT_FOUND,
        QueueError::ValidationError(_) => StatusCode::BAD_REQUEST,
        e if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after_seconds();
        let message = self.to_string();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Request rejected");
        }

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Queue client setup failed: {0}")]
    QueueSetup(#[from] QueueError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
