//! # Cross-App Access Server
//!
//! Axum service hosting the demo suite in one process:
//!
//! - the identity provider (`/idp/login`, `/token-exchange`)
//! - each application's authorization server (`/:app/oauth2/token`)
//! - each application's delegation and assistant endpoints
//!   (`/:app/cross-app-access`, `/:app/assistant`)
//! - each application's item API (`/:app/api/items`)
//!
//! Applications talk to the identity provider and to each other over HTTP,
//! so the same code paths run whether the apps share a process or not.

pub mod api;
pub mod app;
pub mod config;
pub mod observability;
pub mod store;

pub use app::{build_router, AppState};
pub use config::{ConfigError, ServerConfig};
pub use store::{InMemoryResourceStore, Item, NewItem, ResourceStore};
