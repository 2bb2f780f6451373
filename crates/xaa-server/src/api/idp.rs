//! Demo identity provider login.
//!
//! Stands in for an interactive OIDC login: a known user plus a registered
//! client id yield a signed identity token addressed to that client. The
//! token is the subject token later presented for cross-app access.

use crate::api::error::{api_invalid_request, ApiError};
use crate::app::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use xaa_auth::claims::SUBJECT_TOKEN_LIFETIME_SECS;
use xaa_auth::unix_now;

/// A user known to the demo identity provider.
#[derive(Debug, Clone, Copy)]
pub struct DemoUser {
    pub sub: &'static str,
    pub email: &'static str,
}

pub const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        sub: "user-alice",
        email: "alice@example.com",
    },
    DemoUser {
        sub: "user-bob",
        email: "bob@example.com",
    },
];

/// Look up a demo user by email, ignoring case.
pub fn find_user(email: &str) -> Option<&'static DemoUser> {
    DEMO_USERS
        .iter()
        .find(|user| user.email.eq_ignore_ascii_case(email.trim()))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub client_id: String,
    #[serde(default)]
    pub nonce: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub sub: String,
}

pub async fn login(
    State(state): State<AppState>,
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = request?;
    if request.email.trim().is_empty() || request.client_id.is_empty() {
        return Err(api_invalid_request("email and client_id are required"));
    }

    let known_client = state
        .config
        .apps
        .iter()
        .any(|registration| registration.client_id == request.client_id);
    if !known_client {
        warn!(client_id = %request.client_id, "Login for unknown client");
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "invalid_client",
            "unknown client",
        ));
    }

    let user = find_user(&request.email).ok_or_else(|| {
        ApiError::new(StatusCode::UNAUTHORIZED, "access_denied", "unknown user")
    })?;

    let (id_token, claims) = state
        .subject_issuer
        .issue(
            &request.client_id,
            user.sub,
            user.email,
            request.nonce.as_deref(),
            unix_now(),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to issue subject token");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "failed to issue identity token",
            )
        })?;

    info!(sub = user.sub, client_id = %request.client_id, "User logged in");
    Ok(Json(LoginResponse {
        id_token,
        token_type: "Bearer".to_string(),
        expires_in: SUBJECT_TOKEN_LIFETIME_SECS,
        sub: claims.sub,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_user_ignores_case_and_whitespace() {
        assert_eq!(find_user(" Alice@Example.com").unwrap().sub, "user-alice");
        assert!(find_user("mallory@example.com").is_none());
    }
}
