//! Resource storage behind the demo application APIs.
//!
//! Each application exposes a list of items per user. The store is an
//! injected trait object so tests and alternative backends can replace the
//! in-memory default.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;
use xaa_auth::AppId;

/// One resource owned by a user inside an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

/// Payload for creating an item.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid item: {0}")]
    Invalid(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn list_items(&self, app: AppId, owner: &str) -> StoreResult<Vec<Item>>;
    async fn create_item(&self, app: AppId, owner: &str, item: NewItem) -> StoreResult<Item>;
}

/// Volatile store keyed by (application, owner).
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    items: RwLock<HashMap<(AppId, String), Vec<Item>>>,
    next_id: AtomicU64,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with sample items for `owners` in every application.
    pub fn seeded<'a>(owners: impl IntoIterator<Item = &'a str>) -> Self {
        let mut store = Self::new();
        let mut items = HashMap::new();
        for owner in owners {
            for app in AppId::ALL {
                let seeded = sample_titles(app)
                    .iter()
                    .map(|title| Item {
                        id: store.allocate_id(),
                        title: (*title).to_string(),
                        done: false,
                    })
                    .collect::<Vec<_>>();
                items.insert((app, owner.to_string()), seeded);
            }
        }
        store.items = RwLock::new(items);
        store
    }

    fn allocate_id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

fn sample_titles(app: AppId) -> &'static [&'static str] {
    match app {
        AppId::Todo0 => &["Review quarterly plan", "Book dentist appointment"],
        AppId::Inventory => &["Laptop stand (4 in stock)", "USB-C cables (12 in stock)"],
        AppId::Agent0 => &["Summarize inbox", "Draft weekly report"],
        AppId::Jarvis => &["Morning briefing"],
        AppId::Admin => &["Rotate demo secrets"],
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn list_items(&self, app: AppId, owner: &str) -> StoreResult<Vec<Item>> {
        let items = self.items.read().await;
        Ok(items
            .get(&(app, owner.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_item(&self, app: AppId, owner: &str, item: NewItem) -> StoreResult<Item> {
        let title = item.title.trim();
        if title.is_empty() {
            return Err(StoreError::Invalid("title must not be empty".to_string()));
        }

        let created = Item {
            id: self.allocate_id(),
            title: title.to_string(),
            done: item.done,
        };
        let mut items = self.items.write().await;
        items
            .entry((app, owner.to_string()))
            .or_default()
            .push(created.clone());
        Ok(created)
    }
}
