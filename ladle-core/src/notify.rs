use async_trait::async_trait;
use ladle_shared::models::events::{OrderCancelledEvent, OrderDeliveredEvent, OrderPaidEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Status-change events that trigger customer email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
    Paid(OrderPaidEvent),
    Delivered(OrderDeliveredEvent),
    Cancelled(OrderCancelledEvent),
}

impl OrderEvent {
    pub fn order_number(&self) -> &str {
        match self {
            OrderEvent::Paid(e) => &e.order_number,
            OrderEvent::Delivered(e) => &e.order_number,
            OrderEvent::Cancelled(e) => &e.order_number,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification channel is full")]
    ChannelFull,
    #[error("notification channel is closed")]
    ChannelClosed,
}

/// Outbound notification seam. Best-effort: a failure here must never fail
/// or roll back the status transition that produced the event.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, event: OrderEvent) -> Result<(), NotifyError>;
}

/// Dispatcher that just records the event in the log. Used by tests and as
/// a fallback when no mail worker is wired up.
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn notify(&self, event: OrderEvent) -> Result<(), NotifyError> {
        tracing::info!(order_number = event.order_number(), "notification: {:?}", event);
        Ok(())
    }
}

/// Dispatcher that hands events to an in-process queue drained by the mail
/// worker. Uses try_send so a slow consumer can never block a transition.
pub struct ChannelDispatcher {
    tx: mpsc::Sender<OrderEvent>,
}

impl ChannelDispatcher {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<OrderEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationDispatcher for ChannelDispatcher {
    async fn notify(&self, event: OrderEvent) -> Result<(), NotifyError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NotifyError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => NotifyError::ChannelClosed,
        })
    }
}

/// Fire-and-forget emission: spawn the notify call, log on failure, move on.
pub fn dispatch_background(dispatcher: Arc<dyn NotificationDispatcher>, event: OrderEvent) {
    tokio::spawn(async move {
        if let Err(e) = dispatcher.notify(event).await {
            tracing::warn!("dropping notification: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn paid_event(number: &str) -> OrderEvent {
        OrderEvent::Paid(OrderPaidEvent {
            order_id: Uuid::new_v4(),
            order_number: number.to_string(),
            customer_id: None,
            total_cents: 15000,
            timestamp: 0,
        })
    }

    #[tokio::test]
    async fn channel_dispatcher_delivers_events() {
        let (dispatcher, mut rx) = ChannelDispatcher::channel(4);
        dispatcher.notify(paid_event("MD-TEST0001")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.order_number(), "MD-TEST0001");
    }

    #[tokio::test]
    async fn full_channel_fails_without_blocking() {
        let (dispatcher, _rx) = ChannelDispatcher::channel(1);
        dispatcher.notify(paid_event("MD-A")).await.unwrap();

        let err = dispatcher.notify(paid_event("MD-B")).await.unwrap_err();
        assert!(matches!(err, NotifyError::ChannelFull));
    }
}
