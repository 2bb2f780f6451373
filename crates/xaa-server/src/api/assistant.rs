//! Assistant endpoint.
//!
//! `POST /:app/assistant` answers with the user's data from `target_app`
//! when the full delegation chain succeeds, and with a general answer plus
//! the failure reason when it does not. The two cases are distinguished by
//! `personalized` in the response.

use crate::api::error::{api_invalid_request, api_not_found, ApiError};
use crate::api::resources::ItemsResponse;
use crate::api::{path_app, require_bearer};
use crate::app::AppState;
use crate::store::Item;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use xaa_auth::AppId;
use xaa_client::DelegatedData;

#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    pub target_app: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssistantResponse {
    pub app: AppId,
    pub target_app: AppId,
    pub personalized: bool,
    pub answer: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

fn personalized_answer(target: AppId, items: &[Item]) -> String {
    if items.is_empty() {
        return format!("You have nothing in {} right now.", target);
    }
    let titles = items
        .iter()
        .map(|item| item.title.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    format!("You have {} items in {}: {}", items.len(), target, titles)
}

fn general_answer(target: AppId) -> String {
    format!(
        "I couldn't reach {} on your behalf. Open {} directly to see your data.",
        target, target
    )
}

pub async fn ask(
    Path(app): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Result<Json<AssistantRequest>, JsonRejection>,
) -> Result<Json<AssistantResponse>, ApiError> {
    let app = path_app(&app)?;
    let subject_token = require_bearer(&headers)?;
    let Json(request) = request?;
    let target = AppId::parse(&request.target_app)
        .ok_or_else(|| api_invalid_request("unknown target_app"))?;
    let orchestrator = state
        .orchestrators
        .get(&app)
        .ok_or_else(|| api_not_found("application is not configured"))?;

    let response = match orchestrator
        .fetch_with_fallback::<ItemsResponse>(subject_token, target, "/items")
        .await
    {
        DelegatedData::Personalized(data) => AssistantResponse {
            app,
            target_app: target,
            personalized: true,
            answer: personalized_answer(target, &data.items),
            items: data.items,
            fallback_reason: None,
        },
        DelegatedData::Fallback { reason } => AssistantResponse {
            app,
            target_app: target,
            personalized: false,
            answer: general_answer(target),
            items: Vec::new(),
            fallback_reason: Some(reason),
        },
    };
    Ok(Json(response))
}
