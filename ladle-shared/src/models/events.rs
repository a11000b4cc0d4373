use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPaidEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub total_cents: i32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderDeliveredEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub delivery_id: Option<Uuid>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCancelledEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub reason: Option<String>,
    pub timestamp: i64,
}
