//! Target application resource API client.

use super::send;
use crate::error::{Hop, OrchestrationError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

/// Client for bearer-authenticated resource APIs.
#[derive(Debug, Clone)]
pub struct ResourceClient {
    client: Client,
}

impl ResourceClient {
    /// Create a client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// GET `url` with `access_token` as bearer credential.
    #[instrument(skip(self, access_token))]
    pub async fn get<T>(&self, url: &str, access_token: &str) -> Result<T, OrchestrationError>
    where
        T: DeserializeOwned,
    {
        debug!("Fetching delegated resource");
        send(Hop::Resource, self.client.get(url).bearer_auth(access_token)).await
    }

    /// POST a JSON body to `url` with `access_token` as bearer credential.
    #[instrument(skip(self, access_token, body))]
    pub async fn post<B, T>(
        &self,
        url: &str,
        access_token: &str,
        body: &B,
    ) -> Result<T, OrchestrationError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("Posting delegated resource");
        send(
            Hop::Resource,
            self.client.post(url).bearer_auth(access_token).json(body),
        )
        .await
    }
}
