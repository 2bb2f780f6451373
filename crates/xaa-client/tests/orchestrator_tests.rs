//! Delegation chain tests against mock upstreams.
//!
//! One wiremock server plays the identity provider and the target
//! applications, laid out like the hosted demo service:
//! - `POST /token-exchange`
//! - `POST /{app}/oauth2/token`
//! - `GET /{app}/api/...`

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xaa_auth::{unix_now, AppId, AppRegistration, JwtKeys, SubjectTokenIssuer};
use xaa_client::{
    DelegatedData, DelegationOrchestrator, Hop, OrchestrationError, OrchestratorConfig,
};

const ID_JAG_URN: &str = "urn:ietf:params:oauth:token-type:id-jag";

/// Test fixture providing a mock upstream and a subject token issuer.
struct TestFixture {
    server: MockServer,
    issuer: SubjectTokenIssuer,
}

impl TestFixture {
    async fn new() -> Self {
        let keys = Arc::new(JwtKeys::hmac("mock-idp-secret-with-enough-length").unwrap());
        Self {
            server: MockServer::start().await,
            issuer: SubjectTokenIssuer::new("https://idp.example.com", keys),
        }
    }

    fn config(&self) -> OrchestratorConfig {
        OrchestratorConfig::hosted(&AppRegistration::demo(AppId::Jarvis), &self.server.uri())
    }

    fn orchestrator(&self) -> DelegationOrchestrator {
        DelegationOrchestrator::new(self.config()).unwrap()
    }

    fn subject_token(&self, issued_at: i64) -> String {
        self.issuer
            .issue("jarvis-client", "u1", "u1@example.com", None, issued_at)
            .unwrap()
            .0
    }

    async fn mount_exchange(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/token-exchange"))
            .and(body_string_contains(
                "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Atoken-exchange",
            ))
            .and(body_string_contains("audience=https%3A%2F%2Fauth.todo0.com%2F"))
            .and(body_string_contains(
                "client_assertion_type=urn%3Aietf%3Aparams%3Aoauth%3Aclient-assertion-type%3Ajwt-bearer",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issued_token_type": ID_JAG_URN,
                "access_token": "idjag.token.value",
                "token_type": "N_A",
                "expires_in": 300
            })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    async fn mount_token(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/todo0/oauth2/token"))
            .and(body_string_contains("assertion=idjag.token.value"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "todo0-access-token",
                "token_type": "Bearer",
                "expires_in": 86400,
                "scope": "read write"
            })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn test_full_chain_returns_resource_data() {
    let fixture = TestFixture::new().await;
    fixture.mount_exchange(1).await;
    fixture.mount_token(1).await;

    Mock::given(method("GET"))
        .and(path("/todo0/api/items"))
        .and(header("Authorization", "Bearer todo0-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{"id": "1", "title": "Buy milk", "done": false}]
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let token = fixture.subject_token(unix_now());
    let data: serde_json::Value = fixture
        .orchestrator()
        .fetch_resource(&token, AppId::Todo0, "/items")
        .await
        .unwrap();

    assert_eq!(data["items"][0]["title"], "Buy milk");
}

#[tokio::test]
async fn test_delegate_returns_both_tokens() {
    let fixture = TestFixture::new().await;
    fixture.mount_exchange(1).await;
    fixture.mount_token(1).await;

    let token = fixture.subject_token(unix_now());
    let delegation = fixture.orchestrator().delegate(&token, AppId::Todo0).await.unwrap();

    assert_eq!(delegation.target, AppId::Todo0);
    assert_eq!(delegation.id_jag_token.as_deref(), Some("idjag.token.value"));
    assert_eq!(delegation.access.access_token, "todo0-access-token");
    assert_eq!(delegation.access.expires_in, 86400);
}

#[tokio::test]
async fn test_expired_subject_token_aborts_before_any_hop() {
    let fixture = TestFixture::new().await;
    fixture.mount_exchange(0).await;
    fixture.mount_token(0).await;

    let token = fixture.subject_token(unix_now() - 3610);
    let err = fixture
        .orchestrator()
        .delegate(&token, AppId::Todo0)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::SubjectTokenExpired));
}

#[tokio::test]
async fn test_malformed_subject_token_is_rejected_locally() {
    let fixture = TestFixture::new().await;
    fixture.mount_exchange(0).await;

    let err = fixture
        .orchestrator()
        .delegate("not-a-token", AppId::Todo0)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::InvalidSubjectToken));
}

#[tokio::test]
async fn test_exchange_rejection_stops_chain() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/token-exchange"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_target",
            "error_description": "unknown audience: https://auth.todo0.com/"
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;
    fixture.mount_token(0).await;

    let token = fixture.subject_token(unix_now());
    let err = fixture
        .orchestrator()
        .delegate(&token, AppId::Todo0)
        .await
        .unwrap_err();

    match err {
        OrchestrationError::UpstreamRejected {
            hop,
            status,
            error,
            description,
        } => {
            assert_eq!(hop, Hop::TokenExchange);
            assert_eq!(status, 400);
            assert_eq!(error, "invalid_target");
            assert!(description.unwrap().contains("unknown audience"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_errors_are_not_retried() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/token-exchange"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let token = fixture.subject_token(unix_now());
    let err = fixture
        .orchestrator()
        .delegate(&token, AppId::Todo0)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestrationError::UpstreamRejected { status: 503, ref error, .. } if error == "http_error"
    ));
}

#[tokio::test]
async fn test_slow_token_endpoint_times_out() {
    let fixture = TestFixture::new().await;
    fixture.mount_exchange(1).await;

    Mock::given(method("POST"))
        .and(path("/todo0/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(serde_json::json!({})),
        )
        .mount(&fixture.server)
        .await;

    let mut config = fixture.config();
    config.hop_timeout_ms = 200;
    let orchestrator = DelegationOrchestrator::new(config).unwrap();

    let token = fixture.subject_token(unix_now());
    let err = orchestrator.delegate(&token, AppId::Todo0).await.unwrap_err();

    assert!(matches!(
        err,
        OrchestrationError::UpstreamTimeout { hop: Hop::AccessToken }
    ));
}

#[tokio::test]
async fn test_resource_failure_falls_back() {
    let fixture = TestFixture::new().await;
    fixture.mount_exchange(1).await;
    fixture.mount_token(1).await;

    Mock::given(method("GET"))
        .and(path("/todo0/api/items"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let token = fixture.subject_token(unix_now());
    let data: DelegatedData<serde_json::Value> = fixture
        .orchestrator()
        .fetch_with_fallback(&token, AppId::Todo0, "/items")
        .await;

    match data {
        DelegatedData::Fallback { reason } => {
            assert!(reason.contains("resource"));
            assert!(!reason.contains("todo0-access-token"));
        }
        DelegatedData::Personalized(_) => panic!("expected fallback"),
    }
}

#[tokio::test]
async fn test_cached_access_token_skips_exchange() {
    let fixture = TestFixture::new().await;
    fixture.mount_exchange(1).await;
    fixture.mount_token(1).await;

    let mut config = fixture.config();
    config.cache_tokens = true;
    let orchestrator = DelegationOrchestrator::new(config).unwrap();

    let token = fixture.subject_token(unix_now());
    let first = orchestrator.delegate(&token, AppId::Todo0).await.unwrap();
    let second = orchestrator.delegate(&token, AppId::Todo0).await.unwrap();

    assert!(first.id_jag_token.is_some());
    assert!(second.id_jag_token.is_none());
    assert_eq!(second.access.access_token, "todo0-access-token");
}

#[tokio::test]
async fn test_cache_does_not_serve_unsigned_token_for_same_user() {
    let fixture = TestFixture::new().await;
    let token = fixture.subject_token(unix_now());

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({
            "iss": "https://idp.example.com",
            "sub": "u1",
            "aud": "jarvis-client",
            "email": "u1@example.com",
            "iat": unix_now(),
            "exp": unix_now() + 3600,
            "jti": "unsigned-1"
        })
        .to_string(),
    );
    let unsigned = format!("{}.{}.forged", header, payload);

    Mock::given(method("POST"))
        .and(path("/token-exchange"))
        .and(body_string_contains(format!("subject_token={}", token)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issued_token_type": ID_JAG_URN,
            "access_token": "idjag.token.value",
            "token_type": "N_A",
            "expires_in": 300
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token-exchange"))
        .and(body_string_contains(format!("subject_token={}", unsigned)))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "subject token rejected: invalid signature"
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;
    fixture.mount_token(1).await;

    let mut config = fixture.config();
    config.cache_tokens = true;
    let orchestrator = DelegationOrchestrator::new(config).unwrap();

    let legitimate = orchestrator.delegate(&token, AppId::Todo0).await.unwrap();
    assert_eq!(legitimate.access.access_token, "todo0-access-token");

    let err = orchestrator.delegate(&unsigned, AppId::Todo0).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestrationError::UpstreamRejected { hop: Hop::TokenExchange, ref error, .. } if error == "invalid_grant"
    ));
}

#[tokio::test]
async fn test_self_is_not_a_target() {
    let fixture = TestFixture::new().await;
    let token = fixture.subject_token(unix_now());

    let err = fixture
        .orchestrator()
        .delegate(&token, AppId::Jarvis)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestrationError::UnknownTarget(AppId::Jarvis)));
}

#[tokio::test]
async fn test_post_resource_sends_json_with_bearer() {
    let fixture = TestFixture::new().await;
    fixture.mount_exchange(1).await;
    fixture.mount_token(1).await;

    Mock::given(method("POST"))
        .and(path("/todo0/api/items"))
        .and(header("Authorization", "Bearer todo0-access-token"))
        .and(body_string_contains("Water plants"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "7", "title": "Water plants", "done": false
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let token = fixture.subject_token(unix_now());
    let created: serde_json::Value = fixture
        .orchestrator()
        .post_resource(
            &token,
            AppId::Todo0,
            "/items",
            &serde_json::json!({ "title": "Water plants" }),
        )
        .await
        .unwrap();

    assert_eq!(created["id"], "7");
}
