//! API error type.
//!
//! Every endpoint answers failures with the OAuth error body
//! `{"error": ..., "error_description": ...}`. Descriptions are safe to show
//! to clients; internal details are logged, not returned.

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use xaa_auth::{OAuthError, OAuthErrorResponse};
use xaa_client::OrchestrationError;

/// Structured API error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: OAuthErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, description: impl Into<String>) -> Self {
        Self {
            status,
            body: OAuthErrorResponse {
                error: code.to_string(),
                error_description: Some(description.into()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CACHE_CONTROL, "no-store")],
            Json(self.body),
        )
            .into_response()
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            body: err.to_response(),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        api_invalid_request(&rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        api_invalid_request(&rejection.body_text())
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(err: OrchestrationError) -> Self {
        let description = err.user_message();
        match err {
            OrchestrationError::InvalidSubjectToken | OrchestrationError::SubjectTokenExpired => {
                ApiError::new(StatusCode::UNAUTHORIZED, "invalid_token", description)
            }
            OrchestrationError::UnknownTarget(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "invalid_target", description)
            }
            OrchestrationError::UpstreamRejected { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "cross_app_access_denied", description)
            }
            OrchestrationError::UpstreamTimeout { .. } => {
                ApiError::new(StatusCode::GATEWAY_TIMEOUT, "upstream_timeout", description)
            }
            OrchestrationError::Transport { .. } | OrchestrationError::InvalidResponse { .. } => {
                ApiError::new(StatusCode::BAD_GATEWAY, "upstream_error", description)
            }
            OrchestrationError::Configuration(ref message) => {
                tracing::error!(error = %message, "Orchestrator misconfigured");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "server_error", description)
            }
        }
    }
}

/// 401 for missing or unusable credentials.
pub fn api_unauthorized(description: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "invalid_token", description)
}

/// 403 for a valid token lacking the needed scope.
pub fn api_insufficient_scope(description: &str) -> ApiError {
    ApiError::new(StatusCode::FORBIDDEN, "insufficient_scope", description)
}

/// 404 for unknown applications.
pub fn api_not_found(description: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not_found", description)
}

/// 400 for malformed input.
pub fn api_invalid_request(description: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", description)
}
