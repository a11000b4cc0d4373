use crate::models::{Order, OrderStatus};
use async_trait::async_trait;
use ladle_core::StoreError;
use uuid::Uuid;

/// Repository trait for order data access. `insert_order` writes the order
/// header and its items as one atomic unit; a partially written order must
/// never be observable.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError>;

    /// Lookup by gateway transaction id; backs the idempotent checkout retry.
    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, StoreError>;

    /// Compare-and-swap on the status column. The write only lands when the
    /// stored status still equals `from`; a concurrent transition that moved
    /// the order first surfaces as `Conflict("order_status")`.
    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), StoreError>;

    async fn list_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StoreError>;
}
