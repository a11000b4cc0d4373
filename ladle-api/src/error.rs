use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ladle_core::StoreError;
use ladle_dispatch::assembler::DispatchError;
use ladle_order::ledger::{OrderError, TransitionError};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    PaymentDeclined(String),
    GatewayTimeout,
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::PaymentDeclined(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::GatewayTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "payment gateway timed out".to_string(),
            ),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyCart
            | OrderError::BelowMinimumQuantity { .. }
            | OrderError::InvalidQuantity(_)
            | OrderError::UnknownMenuItem(_)
            | OrderError::OutOfDeliveryArea(_)
            | OrderError::AmountOverflow
            | OrderError::CaptchaFailed => AppError::ValidationError(err.to_string()),
            OrderError::Declined(msg) => AppError::PaymentDeclined(msg),
            OrderError::GatewayTimeout => AppError::GatewayTimeout,
            OrderError::GatewayUnavailable(msg) => {
                AppError::InternalServerError(format!("payment gateway unavailable: {}", msg))
            }
            // The charge exists but the order does not. Loudest log we have
            // short of paging someone.
            OrderError::ReconciliationRequired { ref transaction_id } => {
                tracing::error!(
                    transaction_id = %transaction_id,
                    "captured payment without a persisted order, manual reconciliation needed"
                );
                AppError::InternalServerError(err.to_string())
            }
            OrderError::Catalog(msg) => AppError::InternalServerError(msg),
            OrderError::Store(e) => e.into(),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotFound(id) => {
                AppError::NotFoundError(format!("order {} not found", id))
            }
            TransitionError::IllegalTransition { .. } | TransitionError::CancellationTooLate => {
                AppError::ConflictError(err.to_string())
            }
            TransitionError::Store(e) => e.into(),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NoWorkAvailable | DispatchError::NoDriverAvailable => {
                AppError::ConflictError(err.to_string())
            }
            DispatchError::IllegalTransition { .. }
            | DispatchError::IllegalRouteTransition { .. } => {
                AppError::ConflictError(err.to_string())
            }
            DispatchError::DeliveryNotFound(id) => {
                AppError::NotFoundError(format!("delivery {} not found", id))
            }
            DispatchError::RouteNotFound(id) => {
                AppError::NotFoundError(format!("route {} not found", id))
            }
            DispatchError::OrderTransition(msg) => AppError::InternalServerError(msg),
            DispatchError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFoundError("not found".to_string()),
            StoreError::Conflict(what) => AppError::ConflictError(format!("conflict on {}", what)),
            StoreError::Backend(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
