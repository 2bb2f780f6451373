//! Mock resource APIs of the demo applications.
//!
//! `GET /:app/api/items` needs the `read` scope, `POST` needs `write`. Only
//! access tokens minted by `:app`'s own authorization server are accepted.

use crate::api::error::{api_insufficient_scope, api_invalid_request, api_unauthorized, ApiError};
use crate::api::{path_app, require_bearer};
use crate::app::AppState;
use crate::store::{Item, NewItem, StoreError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;
use xaa_auth::{unix_now, AccessTokenClaims, AppId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemsResponse {
    pub items: Vec<Item>,
}

fn authorize(
    state: &AppState,
    app: AppId,
    headers: &HeaderMap,
    scope: &str,
) -> Result<AccessTokenClaims, ApiError> {
    let token = require_bearer(headers)?;
    let minter = state
        .minters
        .get(&app)
        .ok_or_else(|| api_unauthorized("application does not accept tokens"))?;

    let claims = minter.validate_access_token(token, unix_now()).map_err(|err| {
        debug!(app = %app, reason = err.reason(), "Access token rejected");
        api_unauthorized("invalid access token")
    })?;

    if !claims.has_scope(scope) {
        return Err(api_insufficient_scope(&format!("{} scope required", scope)));
    }
    Ok(claims)
}

pub async fn list_items(
    Path(app): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ItemsResponse>, ApiError> {
    let app = path_app(&app)?;
    let claims = authorize(&state, app, &headers, "read")?;

    let items = state
        .store
        .list_items(app, &claims.sub)
        .await
        .map_err(store_error)?;
    Ok(Json(ItemsResponse { items }))
}

pub async fn create_item(
    Path(app): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    item: Result<Json<NewItem>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let app = path_app(&app)?;
    let claims = authorize(&state, app, &headers, "write")?;
    let Json(item) = item?;

    let created = state
        .store
        .create_item(app, &claims.sub, item)
        .await
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::Invalid(message) => api_invalid_request(&message),
    }
}
