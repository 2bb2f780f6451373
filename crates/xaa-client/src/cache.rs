//! Downstream access token cache.
//!
//! Entries are keyed by (subject token digest, target audience) and carry
//! the absolute expiry computed when the token was received. An entry is
//! never returned at or after that expiry.
//!
//! The key is the digest of the exact subject token the identity provider
//! accepted, not a claim read from it. A different token naming the same
//! user misses and has to go through the exchange.

use std::collections::HashMap;
use tokio::sync::RwLock;
use xaa_auth::AccessTokenResponse;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    subject_digest: String,
    audience: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    response: AccessTokenResponse,
    expires_at: i64,
}

/// Concurrent access token cache.
#[derive(Debug, Default)]
pub struct AccessTokenCache {
    entries: RwLock<HashMap<CacheKey, CachedToken>>,
}

impl AccessTokenCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached token for `(subject_digest, audience)` if still valid at `now`.
    ///
    /// The returned `expires_in` is the remaining lifetime.
    pub async fn get(&self, subject_digest: &str, audience: &str, now: i64) -> Option<AccessTokenResponse> {
        let key = CacheKey {
            subject_digest: subject_digest.to_string(),
            audience: audience.to_string(),
        };
        let entries = self.entries.read().await;
        let cached = entries.get(&key)?;
        if now >= cached.expires_at {
            return None;
        }

        let mut response = cached.response.clone();
        response.expires_in = cached.expires_at - now;
        Some(response)
    }

    /// Store a token received at `now`.
    pub async fn insert(
        &self,
        subject_digest: &str,
        audience: &str,
        response: AccessTokenResponse,
        now: i64,
    ) {
        let expires_at = now.saturating_add(response.expires_in);
        let key = CacheKey {
            subject_digest: subject_digest.to_string(),
            audience: audience.to_string(),
        };
        let mut entries = self.entries.write().await;
        entries.retain(|_, cached| now < cached.expires_at);
        entries.insert(key, CachedToken { response, expires_at });
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
