use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// A priced meal on the weekly menu. The price here is the authoritative
/// price: order totals are always computed from it, never from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl MenuItem {
    pub fn new(name: impl Into<String>, price_cents: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            price_cents,
            active: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog backend error: {0}")]
    Backend(String),
}

/// Read access to the menu catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_item(&self, id: Uuid) -> Result<Option<MenuItem>, CatalogError>;
    async fn list_active(&self) -> Result<Vec<MenuItem>, CatalogError>;
}

/// Map-backed catalog for tests and local development.
pub struct InMemoryCatalog {
    items: RwLock<HashMap<Uuid, MenuItem>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_items<I: IntoIterator<Item = MenuItem>>(items: I) -> Self {
        let catalog = Self::new();
        for item in items {
            catalog.upsert(item);
        }
        catalog
    }

    pub fn upsert(&self, item: MenuItem) {
        self.items.write().unwrap().insert(item.id, item);
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn get_item(&self, id: Uuid) -> Result<Option<MenuItem>, CatalogError> {
        Ok(self.items.read().unwrap().get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<MenuItem>, CatalogError> {
        Ok(self
            .items
            .read()
            .unwrap()
            .values()
            .filter(|i| i.active)
            .cloned()
            .collect())
    }
}
