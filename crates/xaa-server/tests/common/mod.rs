#![allow(dead_code)]

use axum::body::Body;
use axum::http::Request;
use std::net::SocketAddr;
use std::sync::Arc;
use xaa_auth::{client_assertion, unix_now, AppId, AppRegistration, JwtKeys};
use xaa_server::api::idp::DEMO_USERS;
use xaa_server::{AppState, InMemoryResourceStore, ServerConfig};

pub const ID_JAG_URN: &str = "urn:ietf:params:oauth:token-type:id-jag";
pub const ID_TOKEN_URN: &str = "urn:ietf:params:oauth:token-type:id_token";
pub const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub const ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

pub fn test_config(base_url: &str) -> ServerConfig {
    ServerConfig::demo(SocketAddr::from(([127, 0, 0, 1], 0)), base_url)
}

pub fn test_state(config: ServerConfig) -> AppState {
    let store = Arc::new(InMemoryResourceStore::seeded(
        DEMO_USERS.iter().map(|user| user.sub),
    ));
    AppState::new(config, store).expect("state")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// Form request. Values must not contain `&`, `=`, `+` or `%`; URNs, URLs
/// and compact JWS values qualify.
pub fn form_request(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request")
}

pub fn get_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("request")
}

/// Client assertion signed with `app`'s demo secret, addressed to `token_endpoint`.
pub fn demo_client_assertion(app: AppId, token_endpoint: &str) -> String {
    let registration = AppRegistration::demo(app);
    let keys = JwtKeys::hmac(registration.client_secret.as_str()).expect("keys");
    client_assertion::generate(&registration.client_id, token_endpoint, &keys, unix_now())
        .expect("assertion")
        .token
}
