// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// Outcome taxonomy for every request path: expected failures carry a stable,
/// client-facing message; internal faults are logged server-side and surfaced
/// opaquely.
#[derive(Debug)]
pub enum ApiError {
    // 401 Unauthorized - missing, invalid, or expired credential
    Unauthenticated(String),

    // 403 Forbidden - role/permission denial
    Forbidden(String),

    // 403 Forbidden - business conflict (dependent records, duplicate keys)
    Conflict(String),

    // 400 Bad Request - whitelist violation, malformed import, missing field
    InvalidInput(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error - unclassified storage/internal fault
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthenticated(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::Conflict(_) => 403,
            ApiError::InvalidInput(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Internal(_) => 500,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InvalidInput(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Internal(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({ "error": self.message() })
    }
}

// Static constructor methods
impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        ApiError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    /// Log the real fault, hand the caller an opaque message.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!("{}: {}", context, err);
        ApiError::Internal("Operation failed".to_string())
    }
}

// Convert other error types to ApiError
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Not found"),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                ApiError::conflict("Duplicate record")
            }
            _ => ApiError::internal("Database error", err),
        }
    }
}

impl From<crate::schema::SchemaError> for ApiError {
    fn from(err: crate::schema::SchemaError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

impl From<crate::auth::AuthError> for ApiError {
    fn from(err: crate::auth::AuthError) -> Self {
        match err {
            crate::auth::AuthError::InvalidToken => {
                ApiError::unauthenticated("Invalid or expired token")
            }
            other => ApiError::internal("Credential handling failed", other),
        }
    }
}

impl From<crate::crypto::CryptoError> for ApiError {
    fn from(err: crate::crypto::CryptoError) -> Self {
        ApiError::internal("Field encryption failed", err)
    }
}

impl From<crate::imports::ImportError> for ApiError {
    fn from(err: crate::imports::ImportError) -> Self {
        match err {
            crate::imports::ImportError::Db(e) => ApiError::internal("Import aborted", e),
            crate::imports::ImportError::Crypto(e) => ApiError::internal("Import aborted", e),
            other => ApiError::invalid_input(other.to_string()),
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
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

/// Handler return type: plain JSON body or a taxonomy error.
pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(ApiError::unauthenticated("x").status_code(), 401);
        assert_eq!(ApiError::forbidden("x").status_code(), 403);
        assert_eq!(ApiError::conflict("x").status_code(), 403);
        assert_eq!(ApiError::invalid_input("x").status_code(), 400);
        assert_eq!(ApiError::not_found("x").status_code(), 404);
        assert_eq!(ApiError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_body_shape_is_single_error_key() {
        let body = ApiError::forbidden("Permission denied").to_json();
        assert_eq!(body, serde_json::json!({ "error": "Permission denied" }));
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_internal_hides_detail() {
        let err = ApiError::internal("ctx", "connection reset by peer");
        assert_eq!(err.message(), "Operation failed");
    }
}
