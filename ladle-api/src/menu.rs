use axum::{extract::State, routing::get, Json, Router};
use ladle_catalog::MenuItem;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MenuItemResponse {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i32,
}

impl From<MenuItem> for MenuItemResponse {
    fn from(item: MenuItem) -> Self {
        MenuItemResponse {
            id: item.id,
            name: item.name,
            price_cents: item.price_cents,
        }
    }
}

/// GET /v1/menu
/// The active menu, the item ids a cart refers to.
pub async fn list_menu(
    State(state): State<AppState>,
) -> Result<Json<Vec<MenuItemResponse>>, AppError> {
    let items = state
        .catalog
        .list_active()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(items.into_iter().map(MenuItemResponse::from).collect()))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/menu", get(list_menu))
}
