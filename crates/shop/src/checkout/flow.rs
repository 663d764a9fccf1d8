//! The order workflow orchestrator.
//!
//! Drives cart → order conversion through a fixed sequence:
//! cart loaded, validated, committed, cart cleared. A failure anywhere
//! before commit leaves the cart untouched; a failure after commit never
//! rolls the order back.

use std::sync::Arc;

use rand::Rng;
use tracing::instrument;

use greenbasket_core::{
    AddressId, Money, OrderId, OrderStatus, PaymentMode, PaymentStatus, UserId,
};

use super::error::CheckoutError;
use super::validate::validate_order;
use crate::db::{RepositoryError, Storage};
use crate::models::{NewOrder, NewOrderItem, Order};

/// Payment details submitted against an existing order.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    /// How the customer paid.
    pub mode: PaymentMode,
    /// Amount paid; must equal the order total.
    pub amount: Money,
    /// Processor transaction reference, when one exists.
    ///
    /// Accepted for API compatibility but not persisted: the order schema
    /// carries no transaction column, and reconciliation happens in the
    /// payment provider's system.
    pub transaction_id: Option<String>,
}

/// The checkout workflow over an injected storage backend.
#[derive(Clone)]
pub struct Checkout {
    storage: Arc<dyn Storage>,
}

impl Checkout {
    /// Create a checkout workflow over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Convert the user's cart into a durable order.
    ///
    /// Loads the cart, builds a candidate order carrying each item's
    /// price-at-adding as its price-at-purchase, validates it, commits order
    /// plus stock decrements atomically, then deletes the source cart.
    /// Cart deletion is best-effort: the order has already been accepted, so
    /// a cleanup failure is logged and never surfaced.
    ///
    /// # Errors
    ///
    /// - `CartNotFound` / `EmptyCart` when there is nothing to convert.
    /// - Any validator error ([`validate_order`]); the cart is untouched.
    /// - `TransactionConflict` when a concurrent order exhausted stock
    ///   between validation and commit; safe to retry from the start.
    #[instrument(skip(self))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        shipping_address_id: AddressId,
        payment_mode: PaymentMode,
    ) -> Result<Order, CheckoutError> {
        let cart = self
            .storage
            .cart_for_user(user_id)
            .await?
            .ok_or(CheckoutError::CartNotFound)?;
        if cart.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let items: Vec<NewOrderItem> = cart
            .items
            .iter()
            .map(|item| NewOrderItem {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                price_at_purchase: item.price_at_adding,
            })
            .collect();

        let mut total = Money::ZERO;
        for item in &items {
            total = item
                .price_at_purchase
                .checked_mul(i64::from(item.quantity))
                .and_then(|line| total.checked_add(line))
                .ok_or(CheckoutError::TotalOverflow)?;
        }

        let draft = NewOrder {
            user_id,
            items,
            total_amount: total,
            shipping_address_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_mode,
            tracking_number: generate_tracking_number(),
        };

        validate_order(self.storage.as_ref(), &draft).await?;

        let order = match self.storage.commit_order(draft).await {
            Ok(order) => order,
            // Validation saw enough stock, so the counter was drained by a
            // concurrent commit.
            Err(RepositoryError::OutOfStock { product_id }) => {
                return Err(CheckoutError::TransactionConflict(product_id));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            total = %order.total_amount,
            "order committed"
        );

        // Order durability takes precedence over cart cleanup tidiness.
        if let Err(err) = self.storage.delete_cart(cart.id).await {
            tracing::warn!(
                error = %err,
                cart_id = %cart.id,
                order_id = %order.id,
                "failed to delete cart after committed order"
            );
        }

        Ok(order)
    }

    /// Cancel an order the user owns, restoring its stock decrements.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` when the order doesn't exist for this user.
    /// - `NotCancellable` unless the order is still `pending` or `confirmed`.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, CheckoutError> {
        let order = self
            .storage
            .order_for_user(user_id, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        if !order.status.is_cancellable() {
            return Err(CheckoutError::NotCancellable(order.status));
        }

        // The storage guard is authoritative: the status may have moved
        // into fulfilment since the read above.
        let cancelled = match self.storage.cancel_order(order_id).await {
            Ok(order) => order,
            Err(RepositoryError::NotCancellable { status }) => {
                return Err(CheckoutError::NotCancellable(status));
            }
            Err(RepositoryError::NotFound) => return Err(CheckoutError::OrderNotFound(order_id)),
            Err(err) => return Err(err.into()),
        };
        tracing::info!(order_id = %order_id, user_id = %user_id, "order cancelled");
        Ok(cancelled)
    }

    /// Set an order's fulfilment status (admin operation).
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` if the order doesn't exist.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, CheckoutError> {
        match self.storage.set_order_status(order_id, status).await {
            Ok(order) => Ok(order),
            Err(RepositoryError::NotFound) => Err(CheckoutError::OrderNotFound(order_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Record a completed payment against an order the user owns.
    ///
    /// The paid amount must equal the order total. On success the payment
    /// status becomes `completed` and a `pending` order is promoted to
    /// `confirmed`.
    ///
    /// # Errors
    ///
    /// - `OrderNotFound` when the order doesn't exist for this user.
    /// - `PaymentAmountMismatch` when the paid amount differs from the total.
    #[instrument(skip(self, payment))]
    pub async fn process_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
        payment: PaymentRequest,
    ) -> Result<Order, CheckoutError> {
        let order = self
            .storage
            .order_for_user(user_id, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        if payment.amount != order.total_amount {
            return Err(CheckoutError::PaymentAmountMismatch {
                paid: payment.amount,
                total: order.total_amount,
            });
        }

        let status = if order.status == OrderStatus::Pending {
            OrderStatus::Confirmed
        } else {
            order.status
        };

        let updated = self
            .storage
            .record_payment(order_id, payment.mode, PaymentStatus::Completed, status)
            .await?;

        tracing::info!(
            order_id = %order_id,
            user_id = %user_id,
            mode = %payment.mode,
            "payment recorded"
        );
        Ok(updated)
    }

    /// List orders across all users (admin operation).
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` on storage failure.
    pub async fn list_orders(&self, limit: i64, offset: i64) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.storage.orders(limit, offset).await?)
    }

    /// List the user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` on storage failure.
    pub async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.storage.orders_for_user(user_id).await?)
    }

    /// Fetch one order the user owns.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` if the order doesn't exist for this user.
    pub async fn order(&self, user_id: UserId, order_id: OrderId) -> Result<Order, CheckoutError> {
        self.storage
            .order_for_user(user_id, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }
}

/// Generate a random six-digit tracking number.
fn generate_tracking_number() -> i32 {
    rand::rng().random_range(100_000..1_000_000)
}
