use crate::models::Delivery;
use crate::repository::DeliveryRepository;
use ladle_core::StoreError;
use std::sync::Arc;

/// Reconciliation pass that gives every eligible order its delivery record.
/// Cheap and safe to run repeatedly and concurrently: duplicate creation is
/// rejected by the one-delivery-per-order constraint and counted as a skip.
/// Driver and route assignment are deliberately left to the assembler.
pub struct DeliverySynchronizer {
    deliveries: Arc<dyn DeliveryRepository>,
}

impl DeliverySynchronizer {
    pub fn new(deliveries: Arc<dyn DeliveryRepository>) -> Self {
        Self { deliveries }
    }

    /// Create missing deliveries; returns how many were actually created.
    pub async fn sync(&self) -> Result<u32, StoreError> {
        let candidates = self.deliveries.sync_candidates().await?;
        let mut created = 0u32;

        for candidate in candidates {
            let delivery = Delivery::new(candidate.order_id, candidate.requested_date);
            match self.deliveries.insert_delivery(&delivery).await {
                Ok(()) => created += 1,
                Err(StoreError::Conflict("delivery_order_id")) => {
                    // A concurrent sync got there first. Not an error.
                    tracing::debug!(order_id = %candidate.order_id, "delivery already exists, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        if created > 0 {
            tracing::info!(created, "delivery sync created records");
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDispatchStore;
    use crate::models::DeliveryStatus;
    use chrono::NaiveDate;
    use chrono::Utc;
    use ladle_order::memory::InMemoryOrderStore;
    use ladle_order::models::{Address, Customer, Order, OrderStatus};
    use ladle_order::repository::OrderRepository;
    use uuid::Uuid;

    fn order_with_status(status: OrderStatus) -> Order {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Order {
            id,
            order_number: format!("MD-{}", &id.simple().to_string()[..8].to_uppercase()),
            customer: Customer::Registered {
                user_id: Uuid::new_v4(),
            },
            address: Address {
                line1: "500 Valencia St".into(),
                line2: None,
                city: "San Francisco".into(),
                state: "CA".into(),
                zip: "94110".into(),
            },
            requested_date: NaiveDate::from_ymd_opt(2026, 9, 6).unwrap(),
            items: Vec::new(),
            subtotal_cents: 0,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            status,
            payment_reference: Some(format!("tx_{}", id.simple())),
            created_at: now,
            updated_at: now,
        }
    }

    async fn fixture(statuses: &[OrderStatus]) -> (Arc<InMemoryOrderStore>, Arc<InMemoryDispatchStore>) {
        let orders = Arc::new(InMemoryOrderStore::new());
        for status in statuses {
            orders.insert_order(&order_with_status(*status)).await.unwrap();
        }
        let dispatch = Arc::new(InMemoryDispatchStore::new(orders.clone()));
        (orders, dispatch)
    }

    #[tokio::test]
    async fn creates_one_delivery_per_eligible_order() {
        let (_orders, dispatch) = fixture(&[OrderStatus::Paid, OrderStatus::Paid]).await;
        let synchronizer = DeliverySynchronizer::new(dispatch.clone());

        assert_eq!(synchronizer.sync().await.unwrap(), 2);
        assert_eq!(dispatch.delivery_count().await, 2);

        // Second pass finds nothing to do.
        assert_eq!(synchronizer.sync().await.unwrap(), 0);
        assert_eq!(dispatch.delivery_count().await, 2);
    }

    #[tokio::test]
    async fn pending_and_cancelled_orders_are_not_eligible() {
        let (_orders, dispatch) = fixture(&[
            OrderStatus::Pending,
            OrderStatus::Cancelled,
            OrderStatus::Completed,
        ])
        .await;
        let synchronizer = DeliverySynchronizer::new(dispatch.clone());

        assert_eq!(synchronizer.sync().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn new_deliveries_start_pending_and_unassigned() {
        let (orders, dispatch) = fixture(&[OrderStatus::Paid]).await;
        DeliverySynchronizer::new(dispatch.clone()).sync().await.unwrap();

        let order = orders
            .list_by_status(&[OrderStatus::Paid])
            .await
            .unwrap()
            .remove(0);
        let delivery = dispatch.delivery_for_order(order.id).await.unwrap().unwrap();

        assert_eq!(delivery.status, DeliveryStatus::Pending);
        assert_eq!(delivery.estimated_arrival, order.requested_date);
        assert!(delivery.driver_id.is_none());
        assert!(delivery.route_id.is_none());
    }

    #[tokio::test]
    async fn concurrent_syncs_never_duplicate() {
        let (_orders, dispatch) = fixture(&[
            OrderStatus::Paid,
            OrderStatus::Paid,
            OrderStatus::Completed,
        ])
        .await;

        let a = DeliverySynchronizer::new(dispatch.clone());
        let b = DeliverySynchronizer::new(dispatch.clone());

        let (ra, rb) = tokio::join!(a.sync(), b.sync());
        let total = ra.unwrap() + rb.unwrap();

        assert_eq!(total, 3);
        assert_eq!(dispatch.delivery_count().await, 3);
    }
}
