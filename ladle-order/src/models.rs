use chrono::{DateTime, NaiveDate, Utc};
use ladle_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order status in the fulfillment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Completed,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The single source of truth for legal order transitions. The graph is
    /// forward-only (Pending -> Paid -> Completed -> Delivered) with a
    /// sideways cancel from Pending or Paid.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Paid)
                | (Paid, Completed)
                | (Completed, Delivered)
                | (Pending, Cancelled)
                | (Paid, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

/// Who placed the order: a registered account or a one-off guest checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Customer {
    Registered {
        user_id: Uuid,
    },
    Guest {
        name: String,
        email: Masked<String>,
        phone: Masked<String>,
    },
}

impl Customer {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Customer::Registered { user_id } => Some(*user_id),
            Customer::Guest { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// The single source of truth for a customer's weekly purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Customer-facing identifier. Unique, immutable once assigned. Internal
    /// ids never leave the system.
    pub order_number: String,
    pub customer: Customer,
    pub address: Address,
    pub requested_date: NaiveDate,
    pub items: Vec<OrderItem>,
    pub subtotal_cents: i32,
    pub tax_cents: i32,
    pub discount_cents: i32,
    pub total_cents: i32,
    pub status: OrderStatus,
    /// Gateway transaction id once captured. Unique: at most one order per
    /// capture, which is what makes checkout retries idempotent.
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn update_status(&mut self, new_status: OrderStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }

    /// Recompute the total from line items; holds by construction, checked
    /// in tests and debug assertions.
    pub fn items_total_cents(&self) -> i32 {
        self.items
            .iter()
            .map(|i| i.price_cents * i.quantity as i32)
            .sum()
    }

    pub fn total_units(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// One menu item within an order. `price_cents` is a snapshot of the catalog
/// price at order time so historical totals stay stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub name: String,
    pub price_cents: i32,
    pub quantity: u32,
}

impl OrderItem {
    pub fn new(order_id: Uuid, menu_item_id: Uuid, name: String, price_cents: i32, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            menu_item_id,
            name,
            price_cents,
            quantity,
        }
    }
}
