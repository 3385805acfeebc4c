/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; every error renders as the
/// shared [`ErrorResponse`] body with `success: false`.
///
/// # Example
///
/// ```
/// use ssobridge_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(found: bool) -> ApiResult<Json<serde_json::Value>> {
///     if !found {
///         return Err(ApiError::NotFound("User not found".to_string()));
///     }
///     Ok(Json(json!({ "success": true })))
/// }
/// ```

use crate::proxy::ProxyError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ssobridge_shared::{
    auth::{jwt::JwtError, session::SessionError},
    backend::BackendError,
    proxy::{ErrorResponse, FieldError, UpstreamError, INVALID_ACTION},
    store::StoreError,
};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unknown proxy action (400)
    InvalidAction,

    /// Unauthorized (401)
    Unauthorized(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., email already mirrored
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<FieldError>),

    /// Backend auth service failure: upstream 4xx passes through, anything
    /// else is 502
    Upstream {
        message: String,
        upstream: Option<UpstreamError>,
    },

    /// Internal server error (500); the detail is logged, never sent
    InternalError(String),

    /// Failed step of a request (500) with a fixed, client-safe message
    /// such as "User creation failed"
    OperationFailed(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::InvalidAction => write!(f, "Bad request: {}", INVALID_ACTION),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Upstream { message, .. } => write!(f, "Upstream error: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::OperationFailed(msg) => write!(f, "Operation failed: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// HTTP status this error renders with
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidAction => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream { upstream, .. } => upstream
                .as_ref()
                .filter(|u| (400..500).contains(&u.status))
                .and_then(|u| StatusCode::from_u16(u.status).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ApiError::InternalError(_) | ApiError::OperationFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::BadRequest(msg) => ErrorResponse::new("bad_request", msg),
            ApiError::InvalidAction => ErrorResponse::new("invalid_action", INVALID_ACTION),
            ApiError::Unauthorized(msg) => ErrorResponse::new("unauthorized", msg),
            ApiError::NotFound(msg) => ErrorResponse::new("not_found", msg),
            ApiError::Conflict(msg) => ErrorResponse::new("conflict", msg),
            ApiError::ValidationError(errors) => ErrorResponse {
                details: Some(errors),
                ..ErrorResponse::new("validation_error", "Request validation failed")
            },
            ApiError::Upstream { message, upstream } => ErrorResponse {
                upstream,
                ..ErrorResponse::new("backend_error", message)
            },
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                ErrorResponse::new("internal_error", "An internal error occurred")
            }
            ApiError::OperationFailed(msg) => ErrorResponse::new("internal_error", msg),
            ApiError::ServiceUnavailable(msg) => ErrorResponse::new("service_unavailable", msg),
        };

        (status, Json(body)).into_response()
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors: Vec<FieldError> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| FieldError {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(errors)
    }
}

/// Convert proxy errors to API errors
impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        let message = err.to_string();
        let detail = std::error::Error::source(&err)
            .map(|source| source.to_string())
            .unwrap_or_default();
        match err {
            ProxyError::InvalidAction(_) => ApiError::InvalidAction,
            ProxyError::Validation(errors) => ApiError::from(errors),
            ProxyError::InvalidEmail => ApiError::ValidationError(vec![FieldError {
                field: "email".to_string(),
                message: "Invalid email format".to_string(),
            }]),
            ProxyError::Backend { source, .. } => {
                let upstream = match source {
                    BackendError::Rejected { status, body } => Some(UpstreamError { status, body }),
                    BackendError::Transport(_) | BackendError::Decode(_) => None,
                };
                ApiError::Upstream { message, upstream }
            }
            ProxyError::AlreadyRegistered(_) => ApiError::Conflict(message),
            ProxyError::UserNotFound => ApiError::NotFound(message),
            ProxyError::IdentityCreation(_)
            | ProxyError::Lookup(_)
            | ProxyError::SessionIssue(_) => {
                tracing::error!(error = %message, %detail, "Proxy request failed");
                ApiError::OperationFailed(message)
            }
        }
    }
}

/// Convert session errors to API errors
impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Jwt(JwtError::Expired) => {
                ApiError::Unauthorized("Token expired".to_string())
            }
            SessionError::Jwt(JwtError::CreateError(e)) => {
                ApiError::InternalError(format!("Token creation failed: {}", e))
            }
            SessionError::Jwt(e) => ApiError::Unauthorized(format!("Invalid token: {}", e)),
            SessionError::NotFound | SessionError::Revoked | SessionError::TokenMismatch => {
                ApiError::Unauthorized(err.to_string())
            }
            SessionError::Store(e) => ApiError::from(e),
        }
    }
}

/// Convert store errors to API errors
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmailTaken(_) => ApiError::Conflict("Email already exists".to_string()),
            StoreError::Unavailable(msg) => ApiError::ServiceUnavailable(msg),
            StoreError::Database(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}
