//! HTTP clients for each hop of the delegation chain.
//!
//! - [`IdpClient`]: token exchange at the identity provider
//! - [`AppTokenClient`]: JWT-bearer grant at a target application
//! - [`ResourceClient`]: bearer calls to a target application's API
//!
//! All three share one `reqwest::Client` configured with the per-hop
//! timeout, and map failures into [`OrchestrationError`] tagged with the hop.

pub mod app_token;
pub mod idp;
pub mod resource;

pub use app_token::AppTokenClient;
pub use idp::IdpClient;
pub use resource::ResourceClient;

use crate::error::{Hop, OrchestrationError};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use xaa_auth::OAuthErrorResponse;

/// Build the shared HTTP client.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, OrchestrationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| OrchestrationError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Send a request and decode a JSON success body.
pub(crate) async fn send<T>(hop: Hop, request: reqwest::RequestBuilder) -> Result<T, OrchestrationError>
where
    T: DeserializeOwned,
{
    let response = request
        .send()
        .await
        .map_err(|e| OrchestrationError::from_reqwest(hop, e))?;
    handle_response(hop, response).await
}

async fn handle_response<T>(hop: Hop, response: reqwest::Response) -> Result<T, OrchestrationError>
where
    T: DeserializeOwned,
{
    let status = response.status();

    if !status.is_success() {
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(hop = %hop, error = %e, "Failed to read upstream error body");
                String::new()
            }
        };
        let (error, description) = match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(parsed) => (parsed.error, parsed.error_description),
            Err(_) => ("http_error".to_string(), None),
        };
        warn!(hop = %hop, status = status.as_u16(), error = %error, "Upstream rejected request");
        return Err(OrchestrationError::UpstreamRejected {
            hop,
            status: status.as_u16(),
            error,
            description,
        });
    }

    response
        .json()
        .await
        .map_err(|e| OrchestrationError::from_reqwest(hop, e))
}
