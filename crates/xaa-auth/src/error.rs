//! Error types for cross-app access operations
//!
//! This module defines the two error layers of the protocol core:
//! - [`AuthError`]: codec, key and configuration failures
//! - [`OAuthError`]: protocol failures reported to token endpoint callers,
//!   shaped after the OAuth 2.0 error response (`error`, `error_description`)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codec and key-material error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token is not a well-formed compact JWS
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Algorithm is not supported by the configured keys
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for codec and key operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// OAuth 2.0 protocol errors raised by the token endpoints.
///
/// Each variant carries a human-readable description. Token endpoints are
/// machine-to-machine, so descriptions may include validation detail, but
/// never raw token contents or secrets.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OAuthError {
    /// Request is missing a parameter or is otherwise malformed
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Grant type is not the one this endpoint accepts
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    /// Subject or requested token type is not supported
    #[error("unsupported_token_type: {0}")]
    UnsupportedTokenType(String),

    /// Presented token or assertion is invalid, expired or mis-addressed
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    /// Client authentication failed
    #[error("invalid_client: {0}")]
    InvalidClient(String),

    /// Requested audience is not a known target application
    #[error("invalid_target: {0}")]
    InvalidTarget(String),

    /// Unexpected failure while minting
    #[error("server_error: {0}")]
    ServerError(String),
}

impl OAuthError {
    /// Machine-readable OAuth error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::UnsupportedTokenType(_) => "unsupported_token_type",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::InvalidClient(_) => "invalid_client",
            OAuthError::InvalidTarget(_) => "invalid_target",
            OAuthError::ServerError(_) => "server_error",
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        match self {
            OAuthError::InvalidRequest(d)
            | OAuthError::UnsupportedGrantType(d)
            | OAuthError::UnsupportedTokenType(d)
            | OAuthError::InvalidGrant(d)
            | OAuthError::InvalidClient(d)
            | OAuthError::InvalidTarget(d)
            | OAuthError::ServerError(d) => d,
        }
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            OAuthError::ServerError(_) => 500,
            _ => 400,
        }
    }

    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(self, OAuthError::ServerError(_))
    }

    /// Build the wire representation of this error.
    pub fn to_response(&self) -> OAuthErrorResponse {
        OAuthErrorResponse {
            error: self.error_code().to_string(),
            error_description: Some(self.description().to_string()),
        }
    }
}

/// OAuth error response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthErrorResponse {
    /// Machine-readable error code
    pub error: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}
