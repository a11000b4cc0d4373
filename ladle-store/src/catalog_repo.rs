use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ladle_catalog::product::{CatalogError, CatalogRepository, MenuItem};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MenuItemRow {
    id: Uuid,
    name: String,
    price_cents: i32,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<MenuItemRow> for MenuItem {
    fn from(row: MenuItemRow) -> Self {
        MenuItem {
            id: row.id,
            name: row.name,
            price_cents: row.price_cents,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn get_item(&self, id: Uuid) -> Result<Option<MenuItem>, CatalogError> {
        let row = sqlx::query_as::<_, MenuItemRow>(
            "SELECT id, name, price_cents, active, created_at FROM menu_items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::Backend(e.to_string()))?;
        Ok(row.map(MenuItem::from))
    }

    async fn list_active(&self) -> Result<Vec<MenuItem>, CatalogError> {
        let rows = sqlx::query_as::<_, MenuItemRow>(
            "SELECT id, name, price_cents, active, created_at FROM menu_items WHERE active ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Backend(e.to_string()))?;
        Ok(rows.into_iter().map(MenuItem::from).collect())
    }
}
