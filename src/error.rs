// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::auth::AuthError;
use crate::database::StoreError;
use crate::filter::QueryError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: BTreeMap<String, String>,
    },
    Duplicate {
        field: String,
        value: String,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),
    PageOutOfRange,

    // 500 Internal Server Error
    InternalServerError(String),
}

impl ApiError {
    pub const DEFAULT_UNAUTHORIZED: &'static str = "You are not logged in! Please log in to get access.";
    pub const DEFAULT_FORBIDDEN: &'static str = "You do not have permission to perform this action";
    pub const DOCUMENT_NOT_FOUND: &'static str = "No Document Found With This Id";
    pub const PAGE_NOT_FOUND: &'static str = "This page does not exist";
    pub const GENERIC_FAILURE: &'static str = "Something went very wrong!";

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::Duplicate { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PageOutOfRange => StatusCode::NOT_FOUND,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::Duplicate { value, .. } => {
                format!("Duplicate field value: {}. Please use another value!", value)
            }
            ApiError::Unauthorized(msg) => msg.clone(),
            ApiError::Forbidden(msg) => msg.clone(),
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::PageOutOfRange => Self::PAGE_NOT_FOUND.to_string(),
            ApiError::InternalServerError(msg) => msg.clone(),
        }
    }

    /// `fail` for client errors, `error` for server errors
    pub fn status(&self) -> &'static str {
        if self.status_code().is_server_error() {
            "error"
        } else {
            "fail"
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "status": self.status(),
            "message": self.message(),
        });

        match self {
            ApiError::ValidationError { field_errors, .. } if !field_errors.is_empty() => {
                response["errors"] = json!(field_errors);
            }
            ApiError::Duplicate { field, .. } => {
                response["errors"] = json!({ field.as_str(): "Duplicate value" });
            }
            _ => {}
        }

        response
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: BTreeMap<String, String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden(Self::DEFAULT_FORBIDDEN.to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn document_not_found() -> Self {
        ApiError::NotFound(Self::DOCUMENT_NOT_FOUND.to_string())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn generic() -> Self {
        ApiError::InternalServerError(Self::GENERIC_FAILURE.to_string())
    }
}

// Convert other error types to ApiError
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field, value } => ApiError::Duplicate { field, value },
            other => {
                // Log the real error but return generic message
                tracing::error!("Store error: {}", other);
                ApiError::generic()
            }
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::PageOutOfRange => ApiError::PageOutOfRange,
            QueryError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Invalid | AuthError::Expired => {
                tracing::warn!("Rejected token: {}", err);
                ApiError::unauthorized(Self::DEFAULT_UNAUTHORIZED)
            }
            AuthError::Signing(_) | AuthError::Hashing(_) => {
                tracing::error!("Auth failure: {}", err);
                ApiError::generic()
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
