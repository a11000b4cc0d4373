use crate::models::{Delivery, Driver, Route, RouteStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ladle_core::StoreError;
use uuid::Uuid;

/// An order that is eligible for a delivery but does not have one yet.
#[derive(Debug, Clone)]
pub struct SyncCandidate {
    pub order_id: Uuid,
    pub requested_date: NaiveDate,
}

/// Repository trait for delivery data access. `insert_delivery` must reject
/// a second delivery for the same order with `Conflict("delivery_order_id")`;
/// that constraint is what makes concurrent sync runs safe.
#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    /// Orders with status in {PAID, COMPLETED, DELIVERED} lacking a delivery.
    async fn sync_candidates(&self) -> Result<Vec<SyncCandidate>, StoreError>;

    async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), StoreError>;

    async fn get_delivery(&self, id: Uuid) -> Result<Option<Delivery>, StoreError>;

    async fn delivery_for_order(&self, order_id: Uuid) -> Result<Option<Delivery>, StoreError>;

    /// Unrouted deliveries in creation order, capped at `limit`.
    async fn unassigned(&self, limit: u32) -> Result<Vec<Delivery>, StoreError>;

    async fn update_delivery(&self, delivery: &Delivery) -> Result<(), StoreError>;
}

/// Repository trait for route data access.
#[async_trait]
pub trait RouteRepository: Send + Sync {
    /// Create the route and bind the given deliveries' route id + sequence
    /// (1..k, in the given order) as one atomic unit. Fails with
    /// `Conflict("route_assignment")` if any delivery is already routed,
    /// leaving nothing assigned.
    async fn create_route_with_assignments(
        &self,
        route: &Route,
        deliveries: &[Uuid],
    ) -> Result<(), StoreError>;

    async fn get_route(&self, id: Uuid) -> Result<Option<Route>, StoreError>;

    /// Deliveries of a route in sequence order.
    async fn route_deliveries(&self, route_id: Uuid) -> Result<Vec<Delivery>, StoreError>;

    async fn update_route_status(&self, id: Uuid, status: RouteStatus) -> Result<(), StoreError>;
}

/// Repository trait for the driver pool.
#[async_trait]
pub trait DriverRepository: Send + Sync {
    async fn active_drivers(&self) -> Result<Vec<Driver>, StoreError>;

    async fn mark_assigned(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
}
