//! # Cross-App Access Client
//!
//! The requesting side of cross-app access. A [`DelegationOrchestrator`]
//! turns a user's identity token into an access token for another
//! application and calls that application's API:
//!
//! ```text
//! subject token ──(token exchange)──▶ ID-JAG ──(jwt-bearer)──▶ access token ──▶ resource API
//! ```
//!
//! Each hop is a single HTTP round trip with its own timeout. Nothing is
//! retried; failures surface as [`OrchestrationError`], and
//! [`DelegationOrchestrator::fetch_with_fallback`] provides the degraded path.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use xaa_auth::AppId;
//! use xaa_client::{DelegatedData, DelegationOrchestrator, OrchestratorConfig};
//!
//! # async fn example(subject_token: &str) -> Result<(), xaa_client::OrchestrationError> {
//! let config = OrchestratorConfig::from_env(AppId::Jarvis)?;
//! let orchestrator = DelegationOrchestrator::new(config)?;
//!
//! let todos: DelegatedData<serde_json::Value> = orchestrator
//!     .fetch_with_fallback(subject_token, AppId::Todo0, "/items")
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod orchestrator;

pub use cache::AccessTokenCache;
pub use config::{
    ConfigError, OrchestratorConfig, ServiceEndpoint, TargetEndpoint, DEFAULT_HOP_TIMEOUT_MS,
};
pub use error::{Hop, OrchestrationError};
pub use orchestrator::{DelegatedData, Delegation, DelegationOrchestrator};
