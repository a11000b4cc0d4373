use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use ladle_order::models::Order;

use crate::checkout::OrderResponse;
use crate::error::AppError;
use crate::state::AppState;

async fn find_by_number(state: &AppState, order_number: &str) -> Result<Order, AppError> {
    state
        .orders
        .get_by_number(order_number)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("order {} not found", order_number)))
}

/// GET /v1/orders/{order_number}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = find_by_number(&state, &order_number).await?;
    Ok(Json(order.into()))
}

/// POST /v1/orders/{order_number}/cancel
/// Rejected with 409 once the delivery has left the kitchen.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = find_by_number(&state, &order_number).await?;
    let cancelled = state.ledger.cancel(order.id).await?;
    Ok(Json(cancelled.into()))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders/{order_number}", get(get_order))
        .route("/v1/orders/{order_number}/cancel", post(cancel_order))
}
