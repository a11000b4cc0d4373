use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery status, independent of the parent order's status but causally
/// derived from it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    InProgress,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn can_transition(self, to: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress) | (InProgress, Delivered) | (Pending, Failed) | (InProgress, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteStatus {
    Planned,
    Active,
    Completed,
}

impl RouteStatus {
    pub fn can_transition(self, to: RouteStatus) -> bool {
        use RouteStatus::*;
        matches!((self, to), (Planned, Active) | (Active, Completed))
    }
}

/// The fulfillment record tracking physical handoff of one order's meals.
/// One-to-one with its order; `route_id` and `sequence` are only ever set
/// together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: DeliveryStatus,
    pub driver_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    /// 1-based position within the route's visiting order.
    pub sequence: Option<u32>,
    pub estimated_arrival: NaiveDate,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub proof_note: Option<String>,
    pub proof_photo_url: Option<String>,
    pub failure_reason: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub fn new(order_id: Uuid, estimated_arrival: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            status: DeliveryStatus::Pending,
            driver_id: None,
            route_id: None,
            sequence: None,
            estimated_arrival,
            latitude: None,
            longitude: None,
            proof_note: None,
            proof_photo_url: None,
            failure_reason: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_status(&mut self, new_status: DeliveryStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }

    pub fn is_assigned(&self) -> bool {
        self.route_id.is_some()
    }
}

/// A driver's dated batch of deliveries for Sunday distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub route_date: NaiveDate,
    pub driver_id: Uuid,
    pub status: RouteStatus,
    /// False when the external optimizer was unavailable and stops were kept
    /// in selection order.
    pub optimized: bool,
    pub total_distance_meters: Option<i32>,
    pub total_duration_seconds: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    pub fn new(route_date: NaiveDate, driver_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            route_date,
            driver_id,
            status: RouteStatus::Planned,
            optimized: false,
            total_distance_meters: None,
            total_duration_seconds: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub last_assigned_at: Option<DateTime<Utc>>,
}

impl Driver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            active: true,
            last_assigned_at: None,
        }
    }
}
