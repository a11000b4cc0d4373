use ladle_core::notify::OrderEvent;
use tokio::sync::mpsc;
use tracing::info;

/// Drains the notification queue and sends the customer email for each
/// event. Email delivery is simulated with a log line; the queue contract
/// (fire-and-forget, never blocks a transition) is the part that matters.
pub async fn run_notification_worker(mut rx: mpsc::Receiver<OrderEvent>) {
    info!("notification worker started");

    while let Some(event) = rx.recv().await {
        match &event {
            OrderEvent::Paid(e) => {
                info!(
                    order_number = %e.order_number,
                    total_cents = e.total_cents,
                    "sending order confirmation email"
                );
            }
            OrderEvent::Delivered(e) => {
                info!(order_number = %e.order_number, "sending delivery confirmation email");
            }
            OrderEvent::Cancelled(e) => {
                info!(
                    order_number = %e.order_number,
                    reason = e.reason.as_deref().unwrap_or("unspecified"),
                    "sending cancellation email"
                );
            }
        }
    }

    info!("notification channel closed, worker exiting");
}
