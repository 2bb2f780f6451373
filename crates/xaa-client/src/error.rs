//! Orchestration errors.

use crate::config::ConfigError;
use thiserror::Error;
use xaa_auth::AppId;

/// A network round trip in the delegation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    /// Identity provider token exchange
    TokenExchange,
    /// Target application JWT-bearer token endpoint
    AccessToken,
    /// Target application resource API
    Resource,
}

impl Hop {
    /// Hop name used in logs and error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Hop::TokenExchange => "token_exchange",
            Hop::AccessToken => "access_token",
            Hop::Resource => "resource",
        }
    }
}

impl std::fmt::Display for Hop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delegation chain failures.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Subject token could not be read
    #[error("Subject token is malformed")]
    InvalidSubjectToken,

    /// Subject token is at or past its expiry; the chain is not started
    #[error("Subject token expired")]
    SubjectTokenExpired,

    /// Target application is not configured
    #[error("Unknown target application: {0}")]
    UnknownTarget(AppId),

    /// Upstream answered with a non-success status
    #[error("{hop} rejected ({status}): {error}")]
    UpstreamRejected {
        /// Failing hop.
        hop: Hop,
        /// HTTP status code.
        status: u16,
        /// OAuth error code, or `http_error` when the body carried none.
        error: String,
        /// Upstream description, if any.
        description: Option<String>,
    },

    /// Upstream did not answer within the hop timeout
    #[error("{hop} timed out")]
    UpstreamTimeout {
        /// Failing hop.
        hop: Hop,
    },

    /// Connection-level failure
    #[error("{hop} request failed: {message}")]
    Transport {
        /// Failing hop.
        hop: Hop,
        /// Error message.
        message: String,
    },

    /// Upstream answered with an unreadable body
    #[error("{hop} returned an invalid response: {message}")]
    InvalidResponse {
        /// Failing hop.
        hop: Hop,
        /// Error message.
        message: String,
    },

    /// Orchestrator could not be built or sign its assertion
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ConfigError> for OrchestrationError {
    fn from(err: ConfigError) -> Self {
        OrchestrationError::Configuration(err.to_string())
    }
}

impl OrchestrationError {
    /// Map a reqwest failure at `hop`.
    pub(crate) fn from_reqwest(hop: Hop, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OrchestrationError::UpstreamTimeout { hop }
        } else if err.is_decode() {
            OrchestrationError::InvalidResponse {
                hop,
                message: err.to_string(),
            }
        } else {
            OrchestrationError::Transport {
                hop,
                message: err.to_string(),
            }
        }
    }

    /// Hop that failed, when the failure happened on the network.
    pub fn hop(&self) -> Option<Hop> {
        match self {
            OrchestrationError::UpstreamRejected { hop, .. }
            | OrchestrationError::UpstreamTimeout { hop }
            | OrchestrationError::Transport { hop, .. }
            | OrchestrationError::InvalidResponse { hop, .. } => Some(*hop),
            _ => None,
        }
    }

    /// Description safe to show end users. Never includes token contents
    /// or upstream descriptions.
    pub fn user_message(&self) -> String {
        match self {
            OrchestrationError::InvalidSubjectToken => "Your session is invalid".to_string(),
            OrchestrationError::SubjectTokenExpired => "Your session has expired".to_string(),
            OrchestrationError::UnknownTarget(app) => format!("{} is not available", app),
            OrchestrationError::UpstreamRejected { hop, error, .. } => {
                format!("Cross-app access was denied at {} ({})", hop, error)
            }
            OrchestrationError::UpstreamTimeout { hop } => {
                format!("Cross-app access timed out at {}", hop)
            }
            OrchestrationError::Transport { hop, .. }
            | OrchestrationError::InvalidResponse { hop, .. } => {
                format!("Cross-app access failed at {}", hop)
            }
            OrchestrationError::Configuration(_) => "Cross-app access is misconfigured".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_upstream_description() {
        let err = OrchestrationError::UpstreamRejected {
            hop: Hop::TokenExchange,
            status: 400,
            error: "invalid_grant".to_string(),
            description: Some("subject token rejected: token expired".to_string()),
        };

        let message = err.user_message();
        assert!(message.contains("token_exchange"));
        assert!(message.contains("invalid_grant"));
        assert!(!message.contains("subject token rejected"));
        assert_eq!(err.hop(), Some(Hop::TokenExchange));
    }

    #[test]
    fn test_hop_display() {
        assert_eq!(Hop::AccessToken.to_string(), "access_token");
        assert_eq!(
            OrchestrationError::UpstreamTimeout { hop: Hop::Resource }.to_string(),
            "resource timed out"
        );
        assert_eq!(OrchestrationError::SubjectTokenExpired.hop(), None);
    }
}
