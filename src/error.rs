//! Error types for OnboardIQ.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Vendor error: {0}")]
    Vendor(#[from] VendorError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors from outbound vendor API calls (Vonage, Foxit, SMTP).
#[derive(Debug, thiserror::Error)]
pub enum VendorError {
    #[error("{vendor} request failed: {reason}")]
    RequestFailed { vendor: String, reason: String },

    #[error("{vendor} rejected the request ({status}): {message}")]
    Rejected {
        vendor: String,
        status: u16,
        message: String,
    },

    #[error("{vendor} returned an unparseable response: {reason}")]
    InvalidResponse { vendor: String, reason: String },

    #[error("{vendor} is not configured")]
    NotConfigured { vendor: String },
}

impl VendorError {
    /// The vendor error text surfaced in `success: false` payloads.
    pub fn vendor_message(&self) -> String {
        match self {
            Self::RequestFailed { reason, .. } => reason.clone(),
            Self::Rejected { message, .. } => message.clone(),
            Self::InvalidResponse { reason, .. } => reason.clone(),
            Self::NotConfigured { vendor } => format!("{vendor} is not configured"),
        }
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Authentication and token errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Admin privileges required")]
    AdminRequired,

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP-facing error: everything a handler can fail with, rendered as a
/// uniform `{"error", "code"}` JSON envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    TooManyAttempts(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Vendor(#[from] VendorError),
}

/// Convenience alias for handler return values.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            ApiError::NotFound { entity } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} not found"),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::TooManyAttempts(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_ATTEMPTS", msg.clone())
            }
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            ApiError::Auth(err) => match err {
                AuthError::AdminRequired => (
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "Admin privileges required".to_string(),
                ),
                AuthError::MissingToken | AuthError::InvalidToken => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    err.to_string(),
                ),
                AuthError::Encoding(msg) => {
                    tracing::error!(error = %msg, "Token encoding error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An unexpected error occurred".to_string(),
                    )
                }
            },
            ApiError::Database(err) => match err {
                DatabaseError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                other => {
                    tracing::error!(error = %other, "Database error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An unexpected error occurred".to_string(),
                    )
                }
            },
            ApiError::Vendor(err) => {
                tracing::warn!(error = %err, "Vendor call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "VENDOR_ERROR",
                    err.vendor_message(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_message_extraction() {
        let err = VendorError::Rejected {
            vendor: "foxit".into(),
            status: 422,
            message: "template not found".into(),
        };
        assert_eq!(err.vendor_message(), "template not found");

        let err = VendorError::NotConfigured {
            vendor: "vonage".into(),
        };
        assert_eq!(err.vendor_message(), "vonage is not configured");
    }

    #[test]
    fn database_not_found_is_404() {
        let err = ApiError::Database(DatabaseError::NotFound {
            entity: "user".into(),
            id: "abc".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_is_400() {
        let response = ApiError::Validation("phone number is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
