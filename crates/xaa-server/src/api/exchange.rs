//! Identity provider token exchange endpoint.
//!
//! `POST /token-exchange` takes an `application/x-www-form-urlencoded`
//! RFC 8693 request and answers with an ID-JAG, or with an OAuth error body.

use crate::api::error::ApiError;
use crate::app::AppState;
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Form, Json};
use xaa_auth::{unix_now, TokenExchangeRequest};

pub async fn token_exchange(
    State(state): State<AppState>,
    request: Result<Form<TokenExchangeRequest>, FormRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Form(request) = request?;
    let response = state.engine.exchange(&request, unix_now())?;
    Ok(([(header::CACHE_CONTROL, "no-store")], Json(response)))
}
