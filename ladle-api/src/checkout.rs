use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::NaiveDate;
use ladle_order::ledger::{CartLine, CheckoutRequest};
use ladle_order::models::{Address, Customer, Order, OrderStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    /// Client-generated id; resubmitting the same body with the same id is
    /// safe and returns the already-created order.
    pub checkout_id: Uuid,
    pub lines: Vec<CartLine>,
    pub customer: Customer,
    pub address: Address,
    pub requested_date: NaiveDate,
    pub payment_token: String,
    pub promo_code: Option<String>,
    pub captcha_token: Option<String>,
    /// What the client's UI displayed. Accepted for telemetry but never
    /// trusted; the server computes the amount to charge from the catalog.
    pub displayed_total_cents: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub name: String,
    pub price_cents: i32,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_number: String,
    pub status: OrderStatus,
    pub requested_date: NaiveDate,
    pub items: Vec<OrderItemResponse>,
    pub subtotal_cents: i32,
    pub tax_cents: i32,
    pub discount_cents: i32,
    pub total_cents: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        OrderResponse {
            order_number: order.order_number,
            status: order.status,
            requested_date: order.requested_date,
            items: order
                .items
                .into_iter()
                .map(|i| OrderItemResponse {
                    name: i.name,
                    price_cents: i.price_cents,
                    quantity: i.quantity,
                })
                .collect(),
            subtotal_cents: order.subtotal_cents,
            tax_cents: order.tax_cents,
            discount_cents: order.discount_cents,
            total_cents: order.total_cents,
            created_at: order.created_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/checkout
/// Validate the cart, capture payment and create the order.
pub async fn checkout(
    State(state): State<AppState>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    if let Some(displayed) = body.displayed_total_cents {
        tracing::debug!(displayed_total_cents = displayed, "client-side total received");
    }

    let order = state
        .ledger
        .checkout(CheckoutRequest {
            checkout_id: body.checkout_id,
            lines: body.lines,
            customer: body.customer,
            address: body.address,
            requested_date: body.requested_date,
            payment_token: body.payment_token,
            promo_code: body.promo_code,
            captcha_token: body.captcha_token,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/checkout", post(checkout))
}
