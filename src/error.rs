/// Unified error types for Coffey
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum CoffeyError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Required credential or secret is missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// External provider returned a transport failure or non-2xx response
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// Malformed caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Image-hosting provider failed during the irreversible upload step
    #[error("Upload error: {0}")]
    Upload(String),

    /// Transient failure driving the bounded-retry bookmark pipeline
    #[error("Transient fetch error: {0}")]
    TransientFetch(String),

    /// Blob storage errors
    #[error("Blob storage error: {0}")]
    BlobStorage(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoffeyError {
    /// Build a provider error from a reqwest transport failure
    pub fn provider_transport(provider: &'static str, err: reqwest::Error) -> Self {
        CoffeyError::Provider {
            provider,
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    /// Build a provider error from a non-2xx response status and body
    pub fn provider_status(provider: &'static str, status: u16, body: String) -> Self {
        CoffeyError::Provider {
            provider,
            status: Some(status),
            message: body,
        }
    }
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert CoffeyError to HTTP response
impl IntoResponse for CoffeyError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            CoffeyError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            CoffeyError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            CoffeyError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            CoffeyError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ConfigurationError",
                self.to_string(),
            ),
            CoffeyError::Provider { .. } => (
                StatusCode::BAD_GATEWAY,
                "ProviderError",
                self.to_string(),
            ),
            CoffeyError::Upload(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UploadError",
                self.to_string(),
            ),
            CoffeyError::Database(_) | CoffeyError::Internal(_) | CoffeyError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for Coffey operations
pub type CoffeyResult<T> = Result<T, CoffeyError>;
