use crate::assembler::DispatchError;
use crate::models::{Delivery, DeliveryStatus};
use crate::repository::DeliveryRepository;
use chrono::Utc;
use ladle_order::ledger::OrderLedger;
use ladle_order::models::OrderStatus;
use ladle_order::repository::OrderRepository;
use std::sync::Arc;
use uuid::Uuid;

/// Driver-side delivery progress: start a stop, complete it with proof, or
/// mark it failed. Completing a delivery drives the parent order to
/// DELIVERED through the ledger's transition table.
pub struct DeliveryProgressService {
    deliveries: Arc<dyn DeliveryRepository>,
    orders: Arc<dyn OrderRepository>,
    ledger: Arc<OrderLedger>,
}

impl DeliveryProgressService {
    pub fn new(
        deliveries: Arc<dyn DeliveryRepository>,
        orders: Arc<dyn OrderRepository>,
        ledger: Arc<OrderLedger>,
    ) -> Self {
        Self {
            deliveries,
            orders,
            ledger,
        }
    }

    pub async fn start(&self, delivery_id: Uuid) -> Result<Delivery, DispatchError> {
        self.advance(delivery_id, DeliveryStatus::InProgress, |_| {})
            .await
    }

    pub async fn complete(
        &self,
        delivery_id: Uuid,
        proof_note: Option<String>,
        proof_photo_url: Option<String>,
    ) -> Result<Delivery, DispatchError> {
        let current = self
            .deliveries
            .get_delivery(delivery_id)
            .await?
            .ok_or(DispatchError::DeliveryNotFound(delivery_id))?;

        // An already-delivered stop means a prior attempt wrote the delivery
        // but died before the order caught up. Skip the delivery write and
        // re-drive the order derivation so a retry can finish the job.
        let delivery = if current.status == DeliveryStatus::Delivered {
            current
        } else {
            self.advance(delivery_id, DeliveryStatus::Delivered, |d| {
                d.proof_note = proof_note;
                d.proof_photo_url = proof_photo_url;
                d.delivered_at = Some(Utc::now());
            })
            .await?
        };

        self.mark_order_delivered(delivery.order_id).await?;
        Ok(delivery)
    }

    pub async fn fail(&self, delivery_id: Uuid, reason: String) -> Result<Delivery, DispatchError> {
        self.advance(delivery_id, DeliveryStatus::Failed, |d| {
            d.failure_reason = Some(reason);
        })
        .await
    }

    async fn advance(
        &self,
        delivery_id: Uuid,
        target: DeliveryStatus,
        apply: impl FnOnce(&mut Delivery),
    ) -> Result<Delivery, DispatchError> {
        let mut delivery = self
            .deliveries
            .get_delivery(delivery_id)
            .await?
            .ok_or(DispatchError::DeliveryNotFound(delivery_id))?;

        if !delivery.status.can_transition(target) {
            return Err(DispatchError::IllegalTransition {
                from: delivery.status,
                to: target,
            });
        }

        apply(&mut delivery);
        delivery.update_status(target);
        self.deliveries.update_delivery(&delivery).await?;
        Ok(delivery)
    }

    /// Derive the order's terminal state from its delivery's. A paid order
    /// passes through COMPLETED on the way to DELIVERED. Safe to re-run from
    /// any intermediate point.
    async fn mark_order_delivered(&self, order_id: Uuid) -> Result<(), DispatchError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| DispatchError::OrderTransition(format!("order {} not found", order_id)))?;

        if order.status == OrderStatus::Delivered {
            return Ok(());
        }
        if order.status == OrderStatus::Paid {
            self.ledger
                .transition(order_id, OrderStatus::Completed)
                .await
                .map_err(|e| DispatchError::OrderTransition(e.to_string()))?;
        }
        self.ledger
            .transition(order_id, OrderStatus::Delivered)
            .await
            .map_err(|e| DispatchError::OrderTransition(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDispatchStore;
    use crate::synchronizer::DeliverySynchronizer;
    use chrono::NaiveDate;
    use ladle_catalog::{InMemoryCatalog, MenuItem, Pricer, PricingConfig};
    use ladle_core::notify::LoggingDispatcher;
    use ladle_core::payment::MockGateway;
    use ladle_core::zone::ZipListChecker;
    use ladle_order::ledger::{CartLine, CheckoutRequest, LedgerConfig};
    use ladle_order::memory::InMemoryOrderStore;
    use ladle_order::models::{Address, Customer};

    struct Fixture {
        orders: Arc<InMemoryOrderStore>,
        dispatch: Arc<InMemoryDispatchStore>,
        ledger: Arc<OrderLedger>,
        progress: DeliveryProgressService,
        meal: MenuItem,
    }

    fn fixture() -> Fixture {
        let meal = MenuItem::new("Sunday roast", 1250);
        let catalog = Arc::new(InMemoryCatalog::with_items([meal.clone()]));
        let orders = Arc::new(InMemoryOrderStore::new());
        let dispatch = Arc::new(InMemoryDispatchStore::new(orders.clone()));

        let ledger = Arc::new(OrderLedger::new(
            catalog,
            orders.clone(),
            Arc::new(MockGateway::approving()),
            Arc::new(ZipListChecker::new(["94110"])),
            None,
            Arc::new(LoggingDispatcher),
            dispatch.clone(),
            Pricer::new(PricingConfig::default()),
            LedgerConfig::default(),
        ));

        let progress =
            DeliveryProgressService::new(dispatch.clone(), orders.clone(), ledger.clone());

        Fixture {
            orders,
            dispatch,
            ledger,
            progress,
            meal,
        }
    }

    async fn paid_order(fx: &Fixture) -> ladle_order::models::Order {
        let meal = fx.meal.clone();
        fx.ledger
            .checkout(CheckoutRequest {
                checkout_id: Uuid::new_v4(),
                lines: vec![CartLine {
                    menu_item_id: meal.id,
                    quantity: 12,
                }],
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
                payment_token: "tok_visa".into(),
                promo_code: None,
                captcha_token: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn completing_a_delivery_delivers_the_order() {
        let fx = fixture();
        let order = paid_order(&fx).await;

        DeliverySynchronizer::new(fx.dispatch.clone()).sync().await.unwrap();
        let delivery = fx.dispatch.delivery_for_order(order.id).await.unwrap().unwrap();

        fx.progress.start(delivery.id).await.unwrap();
        let done = fx
            .progress
            .complete(delivery.id, Some("left at door".into()), None)
            .await
            .unwrap();

        assert_eq!(done.status, DeliveryStatus::Delivered);
        assert!(done.delivered_at.is_some());

        let order = fx.orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn completion_retry_finishes_a_stranded_order() {
        let fx = fixture();
        let order = paid_order(&fx).await;

        DeliverySynchronizer::new(fx.dispatch.clone()).sync().await.unwrap();
        let delivery = fx.dispatch.delivery_for_order(order.id).await.unwrap().unwrap();
        fx.progress.start(delivery.id).await.unwrap();

        // The order store dies between the delivery write and the order
        // derivation.
        fx.orders.fail_next_status_updates(1);
        let err = fx
            .progress
            .complete(delivery.id, Some("left at door".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::OrderTransition(_)));

        let stranded = fx.dispatch.delivery_for_order(order.id).await.unwrap().unwrap();
        assert_eq!(stranded.status, DeliveryStatus::Delivered);
        let order_now = fx.orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order_now.status, OrderStatus::Paid);

        // Retrying re-drives the order without rewriting the delivery.
        let done = fx.progress.complete(delivery.id, None, None).await.unwrap();
        assert_eq!(done.status, DeliveryStatus::Delivered);
        assert_eq!(done.proof_note.as_deref(), Some("left at door"));

        let order_now = fx.orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order_now.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn cancellation_blocked_once_delivery_in_progress() {
        let fx = fixture();
        let order = paid_order(&fx).await;

        DeliverySynchronizer::new(fx.dispatch.clone()).sync().await.unwrap();
        let delivery = fx.dispatch.delivery_for_order(order.id).await.unwrap().unwrap();

        // While the delivery is still pending, cancellation is allowed; once
        // the driver starts, it is too late.
        fx.progress.start(delivery.id).await.unwrap();
        let err = fx.ledger.cancel(order.id).await.unwrap_err();
        assert!(matches!(
            err,
            ladle_order::ledger::TransitionError::CancellationTooLate
        ));
    }

    #[tokio::test]
    async fn cannot_complete_a_pending_delivery() {
        let fx = fixture();
        let order = paid_order(&fx).await;

        DeliverySynchronizer::new(fx.dispatch.clone()).sync().await.unwrap();
        let delivery = fx.dispatch.delivery_for_order(order.id).await.unwrap().unwrap();

        let err = fx.progress.complete(delivery.id, None, None).await.unwrap_err();
        assert!(matches!(err, DispatchError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn failed_delivery_records_reason() {
        let fx = fixture();
        let order = paid_order(&fx).await;

        DeliverySynchronizer::new(fx.dispatch.clone()).sync().await.unwrap();
        let delivery = fx.dispatch.delivery_for_order(order.id).await.unwrap().unwrap();

        let failed = fx
            .progress
            .fail(delivery.id, "nobody home".into())
            .await
            .unwrap();
        assert_eq!(failed.status, DeliveryStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("nobody home"));

        // The order is untouched: failure handling is a human follow-up.
        let order = fx.orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }
}
