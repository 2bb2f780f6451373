//! Identity provider client.

use super::send;
use crate::error::{Hop, OrchestrationError};
use reqwest::Client;
use tracing::{debug, instrument};
use xaa_auth::{TokenExchangeRequest, TokenExchangeResponse};

/// Client for the identity provider's token exchange endpoint.
#[derive(Debug, Clone)]
pub struct IdpClient {
    client: Client,
    token_exchange_url: String,
}

impl IdpClient {
    /// Create a client posting to `token_exchange_url`.
    pub fn new(client: Client, token_exchange_url: impl Into<String>) -> Self {
        Self {
            client,
            token_exchange_url: token_exchange_url.into(),
        }
    }

    /// Exchange a subject token for a delegation token.
    #[instrument(skip(self, request), fields(audience = ?request.audience))]
    pub async fn exchange(
        &self,
        request: &TokenExchangeRequest,
    ) -> Result<TokenExchangeResponse, OrchestrationError> {
        debug!("Requesting delegation token");
        send(
            Hop::TokenExchange,
            self.client.post(&self.token_exchange_url).form(request),
        )
        .await
    }
}
