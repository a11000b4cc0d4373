use crate::models::{Order, OrderStatus};
use crate::repository::OrderRepository;
use async_trait::async_trait;
use ladle_core::StoreError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    by_number: HashMap<String, Uuid>,
    by_reference: HashMap<String, Uuid>,
}

/// Map-backed order store for tests and local development. Enforces the same
/// uniqueness rules as the Postgres schema: order number and payment
/// reference are unique, and the header + items write is all-or-nothing
/// (a single insert under one lock).
pub struct InMemoryOrderStore {
    state: Mutex<State>,
    fail_inserts: AtomicU32,
    fail_status_updates: AtomicU32,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            fail_inserts: AtomicU32::new(0),
            fail_status_updates: AtomicU32::new(0),
        }
    }

    /// Make the next `n` inserts fail with a backend error. Exercises the
    /// capture-then-persist retry path.
    pub fn fail_next_inserts(&self, n: u32) {
        self.fail_inserts.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` status updates fail with a backend error.
    pub fn fail_next_status_updates(&self, n: u32) {
        self.fail_status_updates.store(n, Ordering::SeqCst);
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) > 0 {
            self.fail_inserts.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Backend("injected insert failure".into()));
        }

        let mut state = self.state.lock().await;

        if state.by_number.contains_key(&order.order_number) {
            return Err(StoreError::Conflict("order_number"));
        }
        if let Some(reference) = &order.payment_reference {
            if state.by_reference.contains_key(reference) {
                return Err(StoreError::Conflict("payment_reference"));
            }
        }

        state.by_number.insert(order.order_number.clone(), order.id);
        if let Some(reference) = &order.payment_reference {
            state.by_reference.insert(reference.clone(), order.id);
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .by_number
            .get(order_number)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .by_reference
            .get(reference)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), StoreError> {
        if self.fail_status_updates.load(Ordering::SeqCst) > 0 {
            self.fail_status_updates.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Backend("injected status update failure".into()));
        }

        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or(StoreError::NotFound)?;
        if order.status != from {
            return Err(StoreError::Conflict("order_status"));
        }
        order.update_status(to);
        Ok(())
    }

    async fn list_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| statuses.contains(&o.status))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }
}
