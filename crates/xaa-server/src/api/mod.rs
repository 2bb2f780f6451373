//! HTTP handlers.
//!
//! - `system`: health probe
//! - `idp`: demo login issuing subject tokens
//! - `exchange`: RFC 8693 token exchange at the identity provider
//! - `token`: JWT-bearer grant at each application's authorization server
//! - `cross_app`: delegation on behalf of the logged-in user
//! - `assistant`: personalized answers with an explicit fallback
//! - `resources`: per-application item APIs
pub mod assistant;
pub mod cross_app;
pub mod error;
pub mod exchange;
pub mod idp;
pub mod resources;
pub mod system;
pub mod token;

use crate::api::error::{api_not_found, api_unauthorized, ApiError};
use axum::http::HeaderMap;
use xaa_auth::AppId;

pub(crate) fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    value.strip_prefix("Bearer ").filter(|token| !token.is_empty())
}

pub(crate) fn require_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    extract_bearer(headers).ok_or_else(|| api_unauthorized("missing bearer token"))
}

/// Application named by a `/:app/...` path segment.
pub(crate) fn path_app(raw: &str) -> Result<AppId, ApiError> {
    AppId::parse(raw).ok_or_else(|| api_not_found("unknown application"))
}
