use crate::models::{Delivery, DeliveryStatus, Driver, Route, RouteStatus};
use crate::repository::{DeliveryRepository, DriverRepository, RouteRepository, SyncCandidate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ladle_core::StoreError;
use ladle_order::ledger::FulfillmentProgress;
use ladle_order::memory::InMemoryOrderStore;
use ladle_order::models::OrderStatus;
use ladle_order::repository::OrderRepository;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    deliveries: HashMap<Uuid, Delivery>,
    /// order id -> delivery id; the one-delivery-per-order constraint.
    by_order: HashMap<Uuid, Uuid>,
    /// Creation order, the stable selection key for assembly.
    insertion: Vec<Uuid>,
    routes: HashMap<Uuid, Route>,
    drivers: HashMap<Uuid, Driver>,
}

/// Map-backed dispatch store for tests and local development. Shares the
/// order store so sync candidates can be derived, and enforces the same
/// uniqueness and atomicity rules as the Postgres schema.
pub struct InMemoryDispatchStore {
    orders: Arc<InMemoryOrderStore>,
    state: Mutex<State>,
}

impl InMemoryDispatchStore {
    pub fn new(orders: Arc<InMemoryOrderStore>) -> Self {
        Self {
            orders,
            state: Mutex::new(State::default()),
        }
    }

    pub async fn add_driver(&self, driver: Driver) {
        self.state.lock().await.drivers.insert(driver.id, driver);
    }

    pub async fn delivery_count(&self) -> usize {
        self.state.lock().await.deliveries.len()
    }
}

#[async_trait]
impl DeliveryRepository for InMemoryDispatchStore {
    async fn sync_candidates(&self) -> Result<Vec<SyncCandidate>, StoreError> {
        let eligible = self
            .orders
            .list_by_status(&[
                OrderStatus::Paid,
                OrderStatus::Completed,
                OrderStatus::Delivered,
            ])
            .await?;

        let state = self.state.lock().await;
        Ok(eligible
            .into_iter()
            .filter(|o| !state.by_order.contains_key(&o.id))
            .map(|o| SyncCandidate {
                order_id: o.id,
                requested_date: o.requested_date,
            })
            .collect())
    }

    async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.by_order.contains_key(&delivery.order_id) {
            return Err(StoreError::Conflict("delivery_order_id"));
        }
        state.by_order.insert(delivery.order_id, delivery.id);
        state.insertion.push(delivery.id);
        state.deliveries.insert(delivery.id, delivery.clone());
        Ok(())
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Option<Delivery>, StoreError> {
        Ok(self.state.lock().await.deliveries.get(&id).cloned())
    }

    async fn delivery_for_order(&self, order_id: Uuid) -> Result<Option<Delivery>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .by_order
            .get(&order_id)
            .and_then(|id| state.deliveries.get(id))
            .cloned())
    }

    async fn unassigned(&self, limit: u32) -> Result<Vec<Delivery>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .insertion
            .iter()
            .filter_map(|id| state.deliveries.get(id))
            .filter(|d| !d.is_assigned())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.deliveries.contains_key(&delivery.id) {
            return Err(StoreError::NotFound);
        }
        state.deliveries.insert(delivery.id, delivery.clone());
        Ok(())
    }
}

#[async_trait]
impl RouteRepository for InMemoryDispatchStore {
    async fn create_route_with_assignments(
        &self,
        route: &Route,
        deliveries: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        // Validate the whole batch before touching anything.
        for id in deliveries {
            match state.deliveries.get(id) {
                None => return Err(StoreError::NotFound),
                Some(d) if d.is_assigned() => {
                    return Err(StoreError::Conflict("route_assignment"))
                }
                Some(_) => {}
            }
        }

        state.routes.insert(route.id, route.clone());
        for (i, id) in deliveries.iter().enumerate() {
            let delivery = state.deliveries.get_mut(id).expect("validated above");
            delivery.route_id = Some(route.id);
            delivery.sequence = Some(i as u32 + 1);
            delivery.driver_id = Some(route.driver_id);
            delivery.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_route(&self, id: Uuid) -> Result<Option<Route>, StoreError> {
        Ok(self.state.lock().await.routes.get(&id).cloned())
    }

    async fn route_deliveries(&self, route_id: Uuid) -> Result<Vec<Delivery>, StoreError> {
        let state = self.state.lock().await;
        let mut deliveries: Vec<Delivery> = state
            .deliveries
            .values()
            .filter(|d| d.route_id == Some(route_id))
            .cloned()
            .collect();
        deliveries.sort_by_key(|d| d.sequence);
        Ok(deliveries)
    }

    async fn update_route_status(&self, id: Uuid, status: RouteStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let route = state.routes.get_mut(&id).ok_or(StoreError::NotFound)?;
        route.status = status;
        route.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl DriverRepository for InMemoryDispatchStore {
    async fn active_drivers(&self) -> Result<Vec<Driver>, StoreError> {
        let state = self.state.lock().await;
        let mut drivers: Vec<Driver> = state.drivers.values().filter(|d| d.active).cloned().collect();
        drivers.sort_by_key(|d| d.name.clone());
        Ok(drivers)
    }

    async fn mark_assigned(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let driver = state.drivers.get_mut(&id).ok_or(StoreError::NotFound)?;
        driver.last_assigned_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl FulfillmentProgress for InMemoryDispatchStore {
    async fn delivery_started(&self, order_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .delivery_for_order(order_id)
            .await?
            .map(|d| d.status != DeliveryStatus::Pending)
            .unwrap_or(false))
    }
}
