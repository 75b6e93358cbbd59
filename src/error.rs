// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::store::StoreError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request (malformed/contradictory input)
    Validation(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden (caller lacks ownership/access)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 422 Unprocessable Entity (schema bytes decode as neither YAML nor JSON)
    SchemaParse(String),

    // 502 Bad Gateway (upstream schema fetch failed)
    SchemaFetch(String),

    // 500 Internal Server Error
    Internal(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::SchemaParse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::SchemaFetch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::SchemaParse(msg)
            | ApiError::SchemaFetch(msg)
            | ApiError::Internal(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get stable error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::SchemaParse(_) => "SCHEMA_PARSE_ERROR",
            ApiError::SchemaFetch(_) => "SCHEMA_FETCH_ERROR",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn schema_parse(message: impl Into<String>) -> Self {
        ApiError::SchemaParse(message.into())
    }

    pub fn schema_fetch(message: impl Into<String>) -> Self {
        ApiError::SchemaFetch(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing { collection, id } => {
                ApiError::not_found(format!("{} '{}' not found", collection, id))
            }
            StoreError::BlobMissing(key) => {
                ApiError::not_found(format!("stored file '{}' not found", key))
            }
            StoreError::Database(e) => {
                // Don't expose internal database errors to clients
                tracing::error!("database error: {}", e);
                ApiError::internal("An error occurred while processing your request")
            }
            StoreError::Serialization(e) => {
                tracing::error!("serialization error: {}", e);
                ApiError::internal("Failed to format response")
            }
            StoreError::InvalidField(field) => {
                tracing::error!("invalid query field: {}", field);
                ApiError::internal("An error occurred while processing your request")
            }
        }
    }
}

impl From<crate::projects::ProjectError> for ApiError {
    fn from(err: crate::projects::ProjectError) -> Self {
        use crate::projects::ProjectError;
        match err {
            ProjectError::Validation(msg) => ApiError::validation(msg),
            ProjectError::NotFound(msg) => ApiError::not_found(msg),
            ProjectError::Forbidden(msg) => ApiError::forbidden(msg),
            ProjectError::SchemaFetch(msg) => ApiError::schema_fetch(msg),
            ProjectError::SchemaParse(msg) => ApiError::schema_parse(msg),
            ProjectError::Store(e) => e.into(),
        }
    }
}

impl From<crate::users::UserError> for ApiError {
    fn from(err: crate::users::UserError) -> Self {
        use crate::users::UserError;
        match err {
            UserError::NotFound => ApiError::not_found("User not found"),
            UserError::Store(e) => e.into(),
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
