//! Checkout error taxonomy.

use thiserror::Error;

use greenbasket_core::{AddressId, Money, OrderId, OrderStatus, ProductId, VariantId};

use crate::db::RepositoryError;

/// Failures of the order-placement workflow.
///
/// Validation failures are non-retryable: the shopper must correct the order.
/// Only [`TransactionConflict`](Self::TransactionConflict) may safely be
/// retried by re-running the whole workflow from the cart load; nothing was
/// persisted.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A line item references a product that doesn't exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// A line item references a variant that doesn't exist under its product.
    #[error("variant not found: {0}")]
    VariantNotFound(VariantId),

    /// Requested quantity exceeds the available stock counter.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        variant_id: Option<VariantId>,
        requested: i32,
        available: i32,
    },

    /// A line item has a non-positive quantity.
    #[error("quantity must be greater than 0 for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i32 },

    /// The declared total doesn't match the recomputed sum of line totals.
    #[error("total mismatch: declared {declared}, computed {computed}")]
    TotalMismatch { declared: Money, computed: Money },

    /// Summing the line totals overflowed the representable money range.
    #[error("order total overflows the representable money range")]
    TotalOverflow,

    /// The order's status is not an allowed initial value.
    #[error("invalid initial order status: {0}")]
    InvalidStatus(OrderStatus),

    /// The shipping address doesn't exist.
    #[error("shipping address not found: {0}")]
    AddressNotFound(AddressId),

    /// The shipping address belongs to a different user.
    #[error("shipping address {0} does not belong to the ordering user")]
    AddressOwnershipMismatch(AddressId),

    /// The user has no active cart.
    #[error("no cart found for user")]
    CartNotFound,

    /// The user's cart has no items.
    #[error("cart has no items")]
    EmptyCart,

    /// The order doesn't exist or isn't owned by the caller.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order has progressed past the cancellable statuses.
    #[error("order in '{0}' status cannot be cancelled")]
    NotCancellable(OrderStatus),

    /// Payment amount doesn't match the order total.
    #[error("payment amount {paid} does not match order total {total}")]
    PaymentAmountMismatch { paid: Money, total: Money },

    /// A concurrent order exhausted the stock between validation and commit.
    ///
    /// Nothing was persisted; re-running the workflow from the cart load is
    /// safe.
    #[error("order commit lost a stock race on product {0}")]
    TransactionConflict(ProductId),

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CheckoutError {
    /// Whether re-running the workflow from the start may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionConflict(_))
    }
}
