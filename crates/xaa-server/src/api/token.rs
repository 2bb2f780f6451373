//! Per-application token endpoint.
//!
//! `POST /:app/oauth2/token` accepts the JWT-bearer grant with an ID-JAG
//! assertion and returns an access token for that application's API.

use crate::api::error::{api_not_found, ApiError};
use crate::api::path_app;
use crate::app::AppState;
use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Form, Json};
use xaa_auth::{unix_now, JwtBearerRequest};

pub async fn issue_access_token(
    Path(app): Path<String>,
    State(state): State<AppState>,
    request: Result<Form<JwtBearerRequest>, FormRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let app = path_app(&app)?;
    let Form(request) = request?;
    let minter = state
        .minters
        .get(&app)
        .ok_or_else(|| api_not_found("application has no authorization server"))?;

    let response = minter.mint(&request, unix_now())?;
    Ok(([(header::CACHE_CONTROL, "no-store")], Json(response)))
}
