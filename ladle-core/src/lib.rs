pub mod captcha;
pub mod notify;
pub mod payment;
pub mod zone;

/// Storage-layer failure taxonomy shared by every repository trait.
///
/// `Conflict` carries the logical key that was violated (e.g. "order_number",
/// "payment_reference", "delivery_order_id") so callers can implement
/// fetch-existing or skip semantics per key.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated on {0}")]
    Conflict(&'static str),
    #[error("record not found")]
    NotFound,
    #[error("storage backend error: {0}")]
    Backend(String),
}
