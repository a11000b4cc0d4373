use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// A successful charge against a payment instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capture {
    /// Provider's transaction id (e.g. tx_123).
    pub transaction_id: String,
    pub amount_cents: i32,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The provider refused the charge. The reason is shown to the customer verbatim.
    #[error("payment declined: {0}")]
    Declined(String),

    /// The provider could not be reached at all. No money moved.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// Seam to the external payment provider. The core never inspects card data
/// itself; it hands a tokenized instrument and an amount to the gateway.
///
/// A repeated capture with the same idempotency key must return the original
/// transaction rather than charging a second time.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture(
        &self,
        amount_cents: i32,
        payment_token: &str,
        idempotency_key: Uuid,
    ) -> Result<Capture, CaptureError>;
}

/// Scripted outcome for the next capture attempt on a [`MockGateway`].
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Approve,
    Decline(String),
    /// Sleep before approving; used to exercise caller-side timeouts.
    Slow(Duration),
}

/// In-memory gateway used by tests and local development. Remembers the
/// transaction issued per idempotency key and counts capture attempts so
/// tests can assert the gateway was (or was not) invoked.
pub struct MockGateway {
    script: Mutex<Vec<MockOutcome>>,
    issued: Mutex<HashMap<Uuid, Capture>>,
    calls: AtomicU32,
}

impl MockGateway {
    /// A gateway that approves every capture.
    pub fn approving() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            issued: Mutex::new(HashMap::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Queue an outcome for the next capture attempt. Once the script is
    /// exhausted, captures are approved.
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.script.lock().unwrap().push(outcome);
    }

    /// Number of capture attempts made so far.
    pub fn capture_calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn capture(
        &self,
        amount_cents: i32,
        _payment_token: &str,
        idempotency_key: Uuid,
    ) -> Result<Capture, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        // Idempotent replay: same key, same transaction, no second charge.
        if let Some(existing) = self.issued.lock().unwrap().get(&idempotency_key) {
            return Ok(existing.clone());
        }

        let outcome = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                MockOutcome::Approve
            } else {
                script.remove(0)
            }
        };

        match outcome {
            MockOutcome::Decline(reason) => Err(CaptureError::Declined(reason)),
            MockOutcome::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.issue(amount_cents, idempotency_key))
            }
            MockOutcome::Approve => Ok(self.issue(amount_cents, idempotency_key)),
        }
    }
}

impl MockGateway {
    fn issue(&self, amount_cents: i32, idempotency_key: Uuid) -> Capture {
        let capture = Capture {
            transaction_id: format!("tx_{}", idempotency_key.simple()),
            amount_cents,
            captured_at: Utc::now(),
        };
        self.issued
            .lock()
            .unwrap()
            .insert(idempotency_key, capture.clone());
        capture
    }
}
