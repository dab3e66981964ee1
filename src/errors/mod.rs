//! Error handling module for the classroom hub.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
    pub const WRITE_REJECTED: &str = "WRITE_REJECTED";
    pub const CONFIG_MISSING: &str = "CONFIG_MISSING";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Classified sign-in failure. Raw provider text never leaves the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// The provider was unreachable, misconfigured or answered unexpectedly.
    ProviderError,
    /// Wrong email/password, unknown account, duplicate sign-up and the like.
    InvalidCredentials,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::ProviderError => write!(f, "identity provider error"),
            AuthError::InvalidCredentials => write!(f, "invalid credentials"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Why the store refused a create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRejection {
    PermissionDenied,
    StoreUnavailable,
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// No signed-in session
    Unauthorized(String),
    /// Signed in, but the role does not allow the action
    Forbidden(String),
    /// Resource not found
    NotFound(String),
    /// Local input validation, raised before any store call
    Validation(String),
    /// Sign-in failure
    Auth(AuthError),
    /// The store denied or lost a create call
    WriteRejected(WriteRejection),
    /// A required setting is absent
    ConfigMissing(String),
    /// Database error
    Database(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            AppError::Auth(AuthError::ProviderError) => StatusCode::BAD_GATEWAY,
            AppError::WriteRejected(WriteRejection::PermissionDenied) => StatusCode::FORBIDDEN,
            AppError::WriteRejected(WriteRejection::StoreUnavailable) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::ConfigMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::Forbidden(_) => codes::FORBIDDEN,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Auth(AuthError::InvalidCredentials) => codes::INVALID_CREDENTIALS,
            AppError::Auth(AuthError::ProviderError) => codes::PROVIDER_ERROR,
            AppError::WriteRejected(_) => codes::WRITE_REJECTED,
            AppError::ConfigMissing(_) => codes::CONFIG_MISSING,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Auth(err) => err.to_string(),
            AppError::WriteRejected(WriteRejection::PermissionDenied) => {
                "Write rejected: permission denied".to_string()
            }
            AppError::WriteRejected(WriteRejection::StoreUnavailable) => {
                "Write rejected: store unavailable".to_string()
            }
            AppError::ConfigMissing(msg) => msg.clone(),
            AppError::Database(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }

    /// Transient failures the user can clear by retrying the same action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::WriteRejected(WriteRejection::StoreUnavailable)
                | AppError::Auth(AuthError::ProviderError)
                | AppError::Database(_)
        )
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let details = error
            .is_retryable()
            .then(|| serde_json::json!({ "retryable": true }));

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
