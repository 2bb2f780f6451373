//! Claim sets for the tokens in the cross-app access flow
//!
//! Four token kinds travel through the flow, each with its own claim set:
//! - [`SubjectClaims`]: the user's identity token issued at login
//! - [`IdJagClaims`]: the delegation token minted by token exchange
//! - [`ClientAssertionClaims`]: a client's proof of identity at a token endpoint
//! - [`AccessTokenClaims`]: the downstream access token for a target API
//!
//! All timestamps are Unix seconds.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Lifetime of a subject token.
pub const SUBJECT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Lifetime of a delegation token. Never more than five minutes.
pub const ID_JAG_LIFETIME_SECS: i64 = 300;

/// Lifetime of a client assertion.
pub const CLIENT_ASSERTION_LIFETIME_SECS: i64 = 300;

/// Lifetime of a downstream access token.
pub const ACCESS_TOKEN_LIFETIME_SECS: i64 = 86_400;

/// Scope granted to downstream access tokens.
pub const DEFAULT_SCOPE: &str = "read write";

/// `typ` header of identity tokens and client assertions.
pub const JWT_TYPE: &str = "JWT";

/// `typ` header of delegation tokens.
pub const ID_JAG_TYPE: &str = "oauth-id-jag+jwt";

/// `typ` header of downstream access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "at+jwt";

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Audience claim: a single string or a list of strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience value
    Single(String),
    /// Multiple audience values
    Many(Vec<String>),
}

impl Audience {
    /// Iterate over every audience value.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Audience::Single(value) => std::slice::from_ref(value),
            Audience::Many(values) => values,
        };
        values.iter().map(String::as_str)
    }

    /// Whether any value equals `expected`.
    pub fn contains(&self, expected: &str) -> bool {
        self.iter().any(|value| value == expected)
    }

    /// Whether any value contains `needle` as a substring.
    pub fn contains_substring(&self, needle: &str) -> bool {
        self.iter().any(|value| value.contains(needle))
    }
}

impl From<&str> for Audience {
    fn from(value: &str) -> Self {
        Audience::Single(value.to_string())
    }
}

impl From<String> for Audience {
    fn from(value: String) -> Self {
        Audience::Single(value)
    }
}

impl From<Vec<String>> for Audience {
    fn from(values: Vec<String>) -> Self {
        Audience::Many(values)
    }
}

/// Registered claims every validated token must expose.
pub trait RegisteredClaims {
    /// Issuer
    fn issuer(&self) -> &str;

    /// Audience values
    fn audiences(&self) -> Vec<&str>;

    /// Expiration time
    fn expires_at(&self) -> i64;

    /// Not-before time, when the token carries one
    fn not_before(&self) -> Option<i64> {
        None
    }
}

/// Identity token claims issued by the identity provider at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubjectClaims {
    /// Issuer (identity provider)
    pub iss: String,

    /// Audience (client id of the application the user signed in to)
    pub aud: Audience,

    /// Subject (user id)
    pub sub: String,

    /// User email
    pub email: String,

    /// Issued at
    pub iat: i64,

    /// Expiration time
    pub exp: i64,

    /// Login nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Token id
    pub jti: String,
}

impl SubjectClaims {
    /// Build identity claims valid for one hour from `now`.
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        subject: impl Into<String>,
        email: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            iss: issuer.into(),
            aud: Audience::Single(client_id.into()),
            sub: subject.into(),
            email: email.into(),
            iat: now,
            exp: now + SUBJECT_TOKEN_LIFETIME_SECS,
            nonce: None,
            jti: crate::client_assertion::generate_jti(),
        }
    }

    /// Attach a login nonce.
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Check if the token is expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.exp
    }
}

impl RegisteredClaims for SubjectClaims {
    fn issuer(&self) -> &str {
        &self.iss
    }

    fn audiences(&self) -> Vec<&str> {
        self.aud.iter().collect()
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Delegation token ("ID-JAG") claims.
///
/// Asserts that `requesting_client` may act for `sub` toward the
/// authorization server named in `aud`, for five minutes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdJagClaims {
    /// Issuer (identity provider)
    pub iss: String,

    /// Audience (target authorization server id)
    pub aud: String,

    /// Subject (user id)
    pub sub: String,

    /// User email
    pub email: String,

    /// Issued at
    pub iat: i64,

    /// Not before
    pub nbf: i64,

    /// Expiration time
    pub exp: i64,

    /// Token id
    pub jti: String,

    /// Client id authenticated at the exchange
    pub client_id: String,

    /// Source application acting for the user
    pub requesting_client: String,

    /// Target application
    pub target_client: String,

    /// Delegated scope
    pub scope: String,
}

impl RegisteredClaims for IdJagClaims {
    fn issuer(&self) -> &str {
        &self.iss
    }

    fn audiences(&self) -> Vec<&str> {
        vec![self.aud.as_str()]
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }

    fn not_before(&self) -> Option<i64> {
        Some(self.nbf)
    }
}

/// Client assertion claims (RFC 7523 client authentication).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientAssertionClaims {
    /// Issuer (client id)
    pub iss: String,

    /// Subject (client id)
    pub sub: String,

    /// Audience (token endpoint URL)
    pub aud: Audience,

    /// Issued at
    pub iat: i64,

    /// Expiration time
    pub exp: i64,

    /// Unique assertion id
    pub jti: String,
}

impl RegisteredClaims for ClientAssertionClaims {
    fn issuer(&self) -> &str {
        &self.iss
    }

    fn audiences(&self) -> Vec<&str> {
        self.aud.iter().collect()
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Downstream access token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessTokenClaims {
    /// Issuer (target authorization server id)
    pub iss: String,

    /// Audience (target API id)
    pub aud: String,

    /// Subject (user id)
    pub sub: String,

    /// User email
    pub email: String,

    /// Issued at
    pub iat: i64,

    /// Expiration time
    pub exp: i64,

    /// Token id
    pub jti: String,

    /// Granted scope
    pub scope: String,

    /// Client the access was delegated from
    pub client_id: String,
}

impl AccessTokenClaims {
    /// Whether the space-separated scope includes `scope`.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

impl RegisteredClaims for AccessTokenClaims {
    fn issuer(&self) -> &str {
        &self.iss
    }

    fn audiences(&self) -> Vec<&str> {
        vec![self.aud.as_str()]
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}
