use crate::models::{Address, Customer, Order, OrderItem, OrderStatus};
use crate::number::generate_order_number;
use crate::repository::OrderRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use ladle_catalog::{CatalogRepository, MenuItem, Pricer, Totals};
use ladle_core::captcha::CaptchaVerifier;
use ladle_core::notify::{dispatch_background, NotificationDispatcher, OrderEvent};
use ladle_core::payment::{Capture, CaptureError, PaymentGateway};
use ladle_core::zone::DeliveryZoneChecker;
use ladle_core::StoreError;
use ladle_shared::models::events::{OrderCancelledEvent, OrderDeliveredEvent, OrderPaidEvent};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// One cart line as submitted by the client. Deliberately carries no price:
/// the ledger reprices everything from the catalog.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CartLine {
    pub menu_item_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Client-generated request id, used as the payment idempotency key so a
    /// resubmitted checkout cannot charge twice.
    pub checkout_id: Uuid,
    pub lines: Vec<CartLine>,
    pub customer: Customer,
    pub address: Address,
    pub requested_date: NaiveDate,
    pub payment_token: String,
    pub promo_code: Option<String>,
    pub captcha_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Minimum aggregate units per order (the "at least N meals" rule).
    pub minimum_units: u32,
    /// Budget for the external capture call; elapsed means the money-movement
    /// outcome is unknown, which is not the same thing as a decline.
    pub capture_timeout: Duration,
    /// Attempts for the post-capture persist before escalating.
    pub persist_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            minimum_units: 10,
            capture_timeout: Duration::from_secs(10),
            persist_attempts: 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("order needs at least {minimum} units, got {got}")]
    BelowMinimumQuantity { minimum: u32, got: u32 },

    #[error("invalid quantity for menu item {0}")]
    InvalidQuantity(Uuid),

    #[error("cart total exceeds the maximum chargeable amount")]
    AmountOverflow,

    #[error("unknown menu item {0}")]
    UnknownMenuItem(Uuid),

    #[error("zip {0} is outside the delivery area")]
    OutOfDeliveryArea(String),

    #[error("captcha verification failed")]
    CaptchaFailed,

    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment gateway timed out")]
    GatewayTimeout,

    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// A capture succeeded but the order could not be persisted within the
    /// attempt budget. Escalated for manual reconciliation; the charge is
    /// never silently dropped.
    #[error("payment {transaction_id} captured but order persistence failed")]
    ReconciliationRequired { transaction_id: String },

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("illegal transition from {from:?} to {to:?}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("cancellation too late: delivery already in progress")]
    CancellationTooLate,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Narrow seam into fulfillment: has this order's delivery moved past
/// Pending? Implemented by the dispatch store; the ledger consults it before
/// allowing a paid order to cancel.
#[async_trait]
pub trait FulfillmentProgress: Send + Sync {
    async fn delivery_started(&self, order_id: Uuid) -> Result<bool, StoreError>;
}

/// Progress source for deployments without a dispatch store wired in
/// (nothing has started, cancellation is always allowed).
pub struct NoFulfillment;

#[async_trait]
impl FulfillmentProgress for NoFulfillment {
    async fn delivery_started(&self, _order_id: Uuid) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Owns order creation and status transitions: validates the cart, computes
/// the authoritative total, captures payment, persists the order atomically,
/// and enforces the status graph.
pub struct OrderLedger {
    catalog: Arc<dyn CatalogRepository>,
    orders: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
    zone: Arc<dyn DeliveryZoneChecker>,
    captcha: Option<Arc<dyn CaptchaVerifier>>,
    notifier: Arc<dyn NotificationDispatcher>,
    progress: Arc<dyn FulfillmentProgress>,
    pricer: Pricer,
    config: LedgerConfig,
}

impl OrderLedger {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        orders: Arc<dyn OrderRepository>,
        gateway: Arc<dyn PaymentGateway>,
        zone: Arc<dyn DeliveryZoneChecker>,
        captcha: Option<Arc<dyn CaptchaVerifier>>,
        notifier: Arc<dyn NotificationDispatcher>,
        progress: Arc<dyn FulfillmentProgress>,
        pricer: Pricer,
        config: LedgerConfig,
    ) -> Self {
        Self {
            catalog,
            orders,
            gateway,
            zone,
            captcha,
            notifier,
            progress,
            pricer,
            config,
        }
    }

    /// Run a cart through validation, capture and persistence. Everything
    /// before the capture step has zero side effects.
    pub async fn checkout(&self, req: CheckoutRequest) -> Result<Order, OrderError> {
        let priced = self.validate_cart(&req).await?;

        if !self.zone.is_served(&req.address.zip) {
            return Err(OrderError::OutOfDeliveryArea(req.address.zip.clone()));
        }

        if let Some(verifier) = &self.captcha {
            let token = req.captcha_token.as_deref().unwrap_or("");
            if !verifier.verify(token).await {
                return Err(OrderError::CaptchaFailed);
            }
        }

        let totals = self
            .pricer
            .price(&priced, req.promo_code.as_deref())
            .map_err(|_| OrderError::AmountOverflow)?;

        // Capture before any durable write. The checkout id keys the capture
        // so a resubmit replays the original transaction.
        let capture = match tokio::time::timeout(
            self.config.capture_timeout,
            self.gateway
                .capture(totals.total_cents, &req.payment_token, req.checkout_id),
        )
        .await
        {
            Err(_elapsed) => return Err(OrderError::GatewayTimeout),
            Ok(Err(CaptureError::Declined(reason))) => return Err(OrderError::Declined(reason)),
            Ok(Err(CaptureError::Unavailable(reason))) => {
                return Err(OrderError::GatewayUnavailable(reason))
            }
            Ok(Ok(capture)) => capture,
        };

        let (order, created) = self.persist_captured(&req, priced, totals, capture).await?;

        if created {
            dispatch_background(
                self.notifier.clone(),
                OrderEvent::Paid(OrderPaidEvent {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    customer_id: order.customer.user_id(),
                    total_cents: order.total_cents,
                    timestamp: Utc::now().timestamp(),
                }),
            );
        }

        Ok(order)
    }

    async fn validate_cart(
        &self,
        req: &CheckoutRequest,
    ) -> Result<Vec<(MenuItem, u32)>, OrderError> {
        if req.lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let units: u32 = req.lines.iter().map(|l| l.quantity).sum();
        if let Some(bad) = req.lines.iter().find(|l| l.quantity == 0) {
            return Err(OrderError::InvalidQuantity(bad.menu_item_id));
        }
        if units < self.config.minimum_units {
            return Err(OrderError::BelowMinimumQuantity {
                minimum: self.config.minimum_units,
                got: units,
            });
        }

        let mut priced = Vec::with_capacity(req.lines.len());
        for line in &req.lines {
            let item = self
                .catalog
                .get_item(line.menu_item_id)
                .await
                .map_err(|e| OrderError::Catalog(e.to_string()))?
                .filter(|i| i.active)
                .ok_or(OrderError::UnknownMenuItem(line.menu_item_id))?;
            priced.push((item, line.quantity));
        }
        Ok(priced)
    }

    /// Persist the captured order, retrying transient failures with the same
    /// transaction id. Returns the order plus whether this call created it.
    async fn persist_captured(
        &self,
        req: &CheckoutRequest,
        priced: Vec<(MenuItem, u32)>,
        totals: Totals,
        capture: Capture,
    ) -> Result<(Order, bool), OrderError> {
        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let items = priced
            .iter()
            .map(|(item, qty)| {
                OrderItem::new(order_id, item.id, item.name.clone(), item.price_cents, *qty)
            })
            .collect();

        let mut order = Order {
            id: order_id,
            order_number: generate_order_number(),
            customer: req.customer.clone(),
            address: req.address.clone(),
            requested_date: req.requested_date,
            items,
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            discount_cents: totals.discount_cents,
            total_cents: totals.total_cents,
            status: OrderStatus::Paid,
            payment_reference: Some(capture.transaction_id.clone()),
            created_at: now,
            updated_at: now,
        };

        let mut attempt = 0;
        while attempt < self.config.persist_attempts {
            match self.orders.insert_order(&order).await {
                Ok(()) => return Ok((order, true)),
                Err(StoreError::Conflict("payment_reference")) => {
                    // This capture already produced an order: return it.
                    if let Some(existing) = self
                        .orders
                        .find_by_payment_reference(&capture.transaction_id)
                        .await?
                    {
                        return Ok((existing, false));
                    }
                    // Reference raced away between writes; retry.
                    attempt += 1;
                }
                Err(StoreError::Conflict("order_number")) => {
                    // Collision on the short number; fresh number, same write.
                    // Counts against the budget so a misbehaving store cannot
                    // keep us in this loop forever.
                    order.order_number = generate_order_number();
                    attempt += 1;
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        transaction_id = %capture.transaction_id,
                        "order persist failed after capture: {}",
                        e
                    );
                }
            }
        }

        tracing::error!(
            transaction_id = %capture.transaction_id,
            "persist attempts exhausted for captured payment, escalating"
        );
        Err(OrderError::ReconciliationRequired {
            transaction_id: capture.transaction_id,
        })
    }

    /// Move an order along the status graph. Illegal edges are rejected;
    /// legal ones are durably recorded and reported fire-and-forget.
    pub async fn transition(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> Result<Order, TransitionError> {
        let mut order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(TransitionError::NotFound(order_id))?;

        if !order.status.can_transition(target) {
            return Err(TransitionError::IllegalTransition {
                from: order.status,
                to: target,
            });
        }

        if target == OrderStatus::Cancelled
            && order.status == OrderStatus::Paid
            && self.progress.delivery_started(order_id).await?
        {
            return Err(TransitionError::CancellationTooLate);
        }

        match self.orders.update_status(order_id, order.status, target).await {
            Ok(()) => {}
            Err(StoreError::Conflict("order_status")) => {
                // A concurrent transition won the write; our check ran against
                // a snapshot that no longer holds. Report against the status
                // that actually landed.
                let current = self
                    .orders
                    .get_order(order_id)
                    .await?
                    .ok_or(TransitionError::NotFound(order_id))?;
                return Err(TransitionError::IllegalTransition {
                    from: current.status,
                    to: target,
                });
            }
            Err(e) => return Err(e.into()),
        }
        order.update_status(target);
        self.emit_transition_event(&order, target);
        Ok(order)
    }

    pub async fn cancel(&self, order_id: Uuid) -> Result<Order, TransitionError> {
        self.transition(order_id, OrderStatus::Cancelled).await
    }

    fn emit_transition_event(&self, order: &Order, target: OrderStatus) {
        let timestamp = Utc::now().timestamp();
        let event = match target {
            OrderStatus::Paid => OrderEvent::Paid(OrderPaidEvent {
                order_id: order.id,
                order_number: order.order_number.clone(),
                customer_id: order.customer.user_id(),
                total_cents: order.total_cents,
                timestamp,
            }),
            OrderStatus::Delivered => OrderEvent::Delivered(OrderDeliveredEvent {
                order_id: order.id,
                order_number: order.order_number.clone(),
                delivery_id: None,
                timestamp,
            }),
            OrderStatus::Cancelled => OrderEvent::Cancelled(OrderCancelledEvent {
                order_id: order.id,
                order_number: order.order_number.clone(),
                reason: None,
                timestamp,
            }),
            _ => return,
        };
        dispatch_background(self.notifier.clone(), event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryOrderStore;
    use ladle_catalog::{InMemoryCatalog, PricingConfig};
    use ladle_core::captcha::MockCaptcha;
    use ladle_core::notify::LoggingDispatcher;
    use ladle_core::payment::{MockGateway, MockOutcome};
    use ladle_core::zone::ZipListChecker;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Barrier;

    struct Started(bool);

    #[async_trait]
    impl FulfillmentProgress for Started {
        async fn delivery_started(&self, _order_id: Uuid) -> Result<bool, StoreError> {
            Ok(self.0)
        }
    }

    struct Fixture {
        catalog: Arc<InMemoryCatalog>,
        orders: Arc<InMemoryOrderStore>,
        gateway: Arc<MockGateway>,
        meal: MenuItem,
        ledger: OrderLedger,
    }

    fn fixture() -> Fixture {
        fixture_with(None, Arc::new(NoFulfillment), LedgerConfig {
            minimum_units: 10,
            capture_timeout: Duration::from_secs(5),
            persist_attempts: 3,
        })
    }

    fn fixture_with(
        captcha: Option<Arc<dyn CaptchaVerifier>>,
        progress: Arc<dyn FulfillmentProgress>,
        config: LedgerConfig,
    ) -> Fixture {
        let meal = MenuItem::new("Sunday roast", 1250);
        let catalog = Arc::new(InMemoryCatalog::with_items([meal.clone()]));
        let orders = Arc::new(InMemoryOrderStore::new());
        let gateway = Arc::new(MockGateway::approving());

        let ledger = OrderLedger::new(
            catalog.clone(),
            orders.clone(),
            gateway.clone(),
            Arc::new(ZipListChecker::new(["94110"])),
            captcha,
            Arc::new(LoggingDispatcher),
            progress,
            Pricer::new(PricingConfig::default()),
            config,
        );

        Fixture {
            catalog,
            orders,
            gateway,
            meal,
            ledger,
        }
    }

    fn request(fx: &Fixture, quantity: u32) -> CheckoutRequest {
        request_for(fx.meal.id, quantity)
    }

    fn request_for(menu_item_id: Uuid, quantity: u32) -> CheckoutRequest {
        CheckoutRequest {
            checkout_id: Uuid::new_v4(),
            lines: vec![CartLine {
                menu_item_id,
                quantity,
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
        }
    }

    #[tokio::test]
    async fn twelve_unit_cart_creates_paid_order() {
        let fx = fixture();
        let order = fx.ledger.checkout(request(&fx, 12)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.total_cents, 15000);
        assert_eq!(order.items_total_cents(), order.subtotal_cents);
        assert!(order.payment_reference.is_some());
        assert!(order.order_number.starts_with("MD-"));
    }

    #[tokio::test]
    async fn same_checkout_id_produces_exactly_one_order() {
        let fx = fixture();
        let mut req = request(&fx, 12);
        req.checkout_id = Uuid::new_v4();

        let first = fx.ledger.checkout(req.clone()).await.unwrap();
        let second = fx.ledger.checkout(req).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.payment_reference, second.payment_reference);
        assert_eq!(fx.orders.order_count().await, 1);
    }

    #[tokio::test]
    async fn below_minimum_never_calls_gateway() {
        let fx = fixture();
        let err = fx.ledger.checkout(request(&fx, 4)).await.unwrap_err();

        assert!(matches!(
            err,
            OrderError::BelowMinimumQuantity { minimum: 10, got: 4 }
        ));
        assert_eq!(fx.gateway.capture_calls(), 0);
        assert_eq!(fx.orders.order_count().await, 0);
    }

    #[tokio::test]
    async fn out_of_area_aborts_before_capture() {
        let fx = fixture();
        let mut req = request(&fx, 12);
        req.address.zip = "10001".into();

        let err = fx.ledger.checkout(req).await.unwrap_err();
        assert!(matches!(err, OrderError::OutOfDeliveryArea(_)));
        assert_eq!(fx.gateway.capture_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_menu_item_is_rejected() {
        let fx = fixture();
        let mut req = request(&fx, 12);
        req.lines.push(CartLine {
            menu_item_id: Uuid::new_v4(),
            quantity: 1,
        });

        let err = fx.ledger.checkout(req).await.unwrap_err();
        assert!(matches!(err, OrderError::UnknownMenuItem(_)));
        assert_eq!(fx.gateway.capture_calls(), 0);
    }

    #[tokio::test]
    async fn captcha_failure_short_circuits() {
        let fx = fixture_with(
            Some(Arc::new(MockCaptcha { accept: false })),
            Arc::new(NoFulfillment),
            LedgerConfig::default(),
        );

        let err = fx.ledger.checkout(request(&fx, 12)).await.unwrap_err();
        assert!(matches!(err, OrderError::CaptchaFailed));
        assert_eq!(fx.gateway.capture_calls(), 0);
    }

    #[tokio::test]
    async fn decline_persists_nothing() {
        let fx = fixture();
        fx.gateway
            .push_outcome(MockOutcome::Decline("card expired".into()));

        let err = fx.ledger.checkout(request(&fx, 12)).await.unwrap_err();
        match err {
            OrderError::Declined(reason) => assert_eq!(reason, "card expired"),
            other => panic!("expected decline, got {:?}", other),
        }
        assert_eq!(fx.orders.order_count().await, 0);
    }

    #[tokio::test]
    async fn slow_gateway_times_out_distinctly() {
        let fx = fixture_with(
            None,
            Arc::new(NoFulfillment),
            LedgerConfig {
                minimum_units: 10,
                capture_timeout: Duration::from_millis(10),
                persist_attempts: 3,
            },
        );
        fx.gateway
            .push_outcome(MockOutcome::Slow(Duration::from_millis(200)));

        let err = fx.ledger.checkout(request(&fx, 12)).await.unwrap_err();
        assert!(matches!(err, OrderError::GatewayTimeout));
        assert_eq!(fx.orders.order_count().await, 0);
    }

    #[tokio::test]
    async fn persist_failure_retries_without_second_capture() {
        let fx = fixture();
        fx.orders.fail_next_inserts(1);

        let order = fx.ledger.checkout(request(&fx, 12)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(fx.gateway.capture_calls(), 1);
        assert_eq!(fx.orders.order_count().await, 1);
    }

    #[tokio::test]
    async fn persist_exhaustion_escalates_for_reconciliation() {
        let fx = fixture();
        fx.orders.fail_next_inserts(10);

        let err = fx.ledger.checkout(request(&fx, 12)).await.unwrap_err();
        assert!(matches!(err, OrderError::ReconciliationRequired { .. }));
        assert_eq!(fx.gateway.capture_calls(), 1);
        assert_eq!(fx.orders.order_count().await, 0);
    }

    #[tokio::test]
    async fn transitions_follow_the_graph() {
        let fx = fixture();
        let order = fx.ledger.checkout(request(&fx, 12)).await.unwrap();

        // Paid -> Delivered skips Completed and must fail.
        let err = fx
            .ledger
            .transition(order.id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::IllegalTransition { .. }));

        let order = fx
            .ledger
            .transition(order.id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Completed);

        let order = fx
            .ledger
            .transition(order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);

        // Terminal: no way back.
        let err = fx
            .ledger
            .transition(order.id, OrderStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn paid_order_cancels_while_delivery_pending() {
        let fx = fixture();
        let order = fx.ledger.checkout(request(&fx, 12)).await.unwrap();

        let cancelled = fx.ledger.cancel(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancellation_rejected_once_delivery_started() {
        let fx = fixture_with(None, Arc::new(Started(true)), LedgerConfig::default());
        let order = fx.ledger.checkout(request(&fx, 12)).await.unwrap();

        let err = fx.ledger.cancel(order.id).await.unwrap_err();
        assert!(matches!(err, TransitionError::CancellationTooLate));
    }

    /// Holds the first `gated` readers at a barrier after they load the
    /// order, so two transitions are forced to act on the same snapshot.
    struct SnapshotGate {
        inner: Arc<InMemoryOrderStore>,
        barrier: Barrier,
        gated: AtomicU32,
    }

    #[async_trait]
    impl OrderRepository for SnapshotGate {
        async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
            self.inner.insert_order(order).await
        }

        async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
            let order = self.inner.get_order(id).await;
            if self.gated.load(Ordering::SeqCst) > 0 {
                self.gated.fetch_sub(1, Ordering::SeqCst);
                self.barrier.wait().await;
            }
            order
        }

        async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
            self.inner.get_by_number(order_number).await
        }

        async fn find_by_payment_reference(
            &self,
            reference: &str,
        ) -> Result<Option<Order>, StoreError> {
            self.inner.find_by_payment_reference(reference).await
        }

        async fn update_status(
            &self,
            id: Uuid,
            from: OrderStatus,
            to: OrderStatus,
        ) -> Result<(), StoreError> {
            self.inner.update_status(id, from, to).await
        }

        async fn list_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StoreError> {
            self.inner.list_by_status(statuses).await
        }
    }

    #[tokio::test]
    async fn racing_transitions_cannot_cross_a_terminal_state() {
        let meal = MenuItem::new("Sunday roast", 1250);
        let catalog = Arc::new(InMemoryCatalog::with_items([meal.clone()]));
        let store = Arc::new(InMemoryOrderStore::new());
        let gated = Arc::new(SnapshotGate {
            inner: store.clone(),
            barrier: Barrier::new(2),
            gated: AtomicU32::new(0),
        });

        let ledger = OrderLedger::new(
            catalog,
            gated.clone(),
            Arc::new(MockGateway::approving()),
            Arc::new(ZipListChecker::new(["94110"])),
            None,
            Arc::new(LoggingDispatcher),
            Arc::new(NoFulfillment),
            Pricer::new(PricingConfig::default()),
            LedgerConfig::default(),
        );

        let order = ledger.checkout(request_for(meal.id, 12)).await.unwrap();

        // Both transitions read the same PAID snapshot before either writes.
        gated.gated.store(2, Ordering::SeqCst);
        let (cancel, complete) = tokio::join!(
            ledger.cancel(order.id),
            ledger.transition(order.id, OrderStatus::Completed)
        );

        assert_eq!(
            u32::from(cancel.is_ok()) + u32::from(complete.is_ok()),
            1,
            "exactly one of the racing transitions may land"
        );

        let winner = if cancel.is_ok() {
            OrderStatus::Cancelled
        } else {
            OrderStatus::Completed
        };
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, winner);

        let loser = if cancel.is_ok() {
            complete.unwrap_err()
        } else {
            cancel.unwrap_err()
        };
        assert!(matches!(loser, TransitionError::IllegalTransition { .. }));
    }

    /// Rejects every insert with an order-number conflict and counts the
    /// calls.
    struct NumberClash {
        inner: Arc<InMemoryOrderStore>,
        inserts: AtomicU32,
    }

    #[async_trait]
    impl OrderRepository for NumberClash {
        async fn insert_order(&self, _order: &Order) -> Result<(), StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Conflict("order_number"))
        }

        async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
            self.inner.get_order(id).await
        }

        async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
            self.inner.get_by_number(order_number).await
        }

        async fn find_by_payment_reference(
            &self,
            reference: &str,
        ) -> Result<Option<Order>, StoreError> {
            self.inner.find_by_payment_reference(reference).await
        }

        async fn update_status(
            &self,
            id: Uuid,
            from: OrderStatus,
            to: OrderStatus,
        ) -> Result<(), StoreError> {
            self.inner.update_status(id, from, to).await
        }

        async fn list_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, StoreError> {
            self.inner.list_by_status(statuses).await
        }
    }

    #[tokio::test]
    async fn order_number_collisions_consume_the_attempt_budget() {
        let meal = MenuItem::new("Sunday roast", 1250);
        let catalog = Arc::new(InMemoryCatalog::with_items([meal.clone()]));
        let clash = Arc::new(NumberClash {
            inner: Arc::new(InMemoryOrderStore::new()),
            inserts: AtomicU32::new(0),
        });

        let ledger = OrderLedger::new(
            catalog,
            clash.clone(),
            Arc::new(MockGateway::approving()),
            Arc::new(ZipListChecker::new(["94110"])),
            None,
            Arc::new(LoggingDispatcher),
            Arc::new(NoFulfillment),
            Pricer::new(PricingConfig::default()),
            LedgerConfig {
                minimum_units: 10,
                capture_timeout: Duration::from_secs(5),
                persist_attempts: 3,
            },
        );

        let err = ledger.checkout(request_for(meal.id, 12)).await.unwrap_err();
        assert!(matches!(err, OrderError::ReconciliationRequired { .. }));
        assert_eq!(clash.inserts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn inactive_menu_item_is_not_sellable() {
        let fx = fixture();
        let mut retired = fx.meal.clone();
        retired.active = false;
        fx.catalog.upsert(retired);

        let err = fx.ledger.checkout(request(&fx, 12)).await.unwrap_err();
        assert!(matches!(err, OrderError::UnknownMenuItem(_)));
    }
}
