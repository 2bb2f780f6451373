//! Cross-app access endpoint.
//!
//! `POST /:app/cross-app-access` runs the first two hops of the delegation
//! chain for `:app` on behalf of the user whose subject token is presented
//! as the bearer credential, and returns the resulting tokens.

use crate::api::error::{api_invalid_request, api_not_found, ApiError};
use crate::api::{path_app, require_bearer};
use crate::app::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use xaa_auth::AppId;

#[derive(Debug, Deserialize)]
pub struct CrossAppAccessRequest {
    pub target_app: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CrossAppAccessResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_jag_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
    pub target_app: AppId,
}

pub async fn cross_app_access(
    Path(app): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Result<Json<CrossAppAccessRequest>, JsonRejection>,
) -> Result<Json<CrossAppAccessResponse>, ApiError> {
    let app = path_app(&app)?;
    let subject_token = require_bearer(&headers)?;
    let Json(request) = request?;
    let target = AppId::parse(&request.target_app)
        .ok_or_else(|| api_invalid_request("unknown target_app"))?;
    let orchestrator = state
        .orchestrators
        .get(&app)
        .ok_or_else(|| api_not_found("application is not configured"))?;

    let delegation = orchestrator.delegate(subject_token, target).await?;

    Ok(Json(CrossAppAccessResponse {
        access_token: delegation.access.access_token,
        id_jag_token: delegation.id_jag_token,
        token_type: delegation.access.token_type,
        expires_in: delegation.access.expires_in,
        scope: delegation.access.scope,
        target_app: delegation.target,
    }))
}
