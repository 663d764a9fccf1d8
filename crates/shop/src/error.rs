//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-class errors to
//! Sentry before responding to the client. All route handlers should return
//! `Result<T, AppError>`. Responses carry the JSON envelope
//! `{"status", "message", "internalError"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::checkout::CheckoutError;
use crate::db::RepositoryError;

/// Application-level error type for the shop.
#[derive(Debug, Error)]
pub enum AppError {
    /// Checkout workflow failure.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Database operation failed outside the checkout workflow.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error envelope returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    internal_error: Option<String>,
}

impl AppError {
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Internal(_) => true,
            Self::Checkout(CheckoutError::Repository(_)) => true,
            _ => false,
        }
    }
}

/// Map a checkout error onto an HTTP status code.
///
/// 417 for empty-cart and order-creation failures matches the public API
/// contract; 409 marks the one retryable condition.
const fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::CartNotFound
        | CheckoutError::AddressNotFound(_)
        | CheckoutError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        CheckoutError::EmptyCart
        | CheckoutError::ProductNotFound(_)
        | CheckoutError::VariantNotFound(_)
        | CheckoutError::InsufficientStock { .. }
        | CheckoutError::InvalidQuantity { .. }
        | CheckoutError::TotalMismatch { .. }
        | CheckoutError::TotalOverflow
        | CheckoutError::InvalidStatus(_)
        | CheckoutError::AddressOwnershipMismatch(_) => StatusCode::EXPECTATION_FAILED,
        CheckoutError::NotCancellable(_) | CheckoutError::PaymentAmountMismatch { .. } => {
            StatusCode::BAD_REQUEST
        }
        CheckoutError::TransactionConflict(_) => StatusCode::CONFLICT,
        CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Checkout(err) => checkout_status(err),
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients; validation
        // failures are surfaced verbatim so the shopper can correct
        // the order.
        let (message, internal_error) = match &self {
            Self::Checkout(CheckoutError::Repository(_)) | Self::Database(_) | Self::Internal(_) => {
                ("Internal server error".to_owned(), None)
            }
            Self::Checkout(err) => ("Not able to create order".to_owned(), Some(err.to_string())),
            Self::Unauthorized(msg) | Self::BadRequest(msg) => (msg.clone(), None),
        };

        let body = ErrorBody {
            status: status.as_u16(),
            message,
            internal_error,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
