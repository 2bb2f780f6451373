//! Target application token endpoint client.

use super::send;
use crate::error::{Hop, OrchestrationError};
use reqwest::Client;
use tracing::{debug, instrument};
use xaa_auth::{AccessTokenResponse, JwtBearerRequest};

/// Client for target applications' JWT-bearer token endpoints.
#[derive(Debug, Clone)]
pub struct AppTokenClient {
    client: Client,
}

impl AppTokenClient {
    /// Create a client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Present a delegation token and receive an access token.
    #[instrument(skip(self, id_jag_token))]
    pub async fn request_access_token(
        &self,
        token_url: &str,
        id_jag_token: &str,
    ) -> Result<AccessTokenResponse, OrchestrationError> {
        debug!("Requesting access token");
        let form = JwtBearerRequest::new(id_jag_token);
        send(Hop::AccessToken, self.client.post(token_url).form(&form)).await
    }
}
