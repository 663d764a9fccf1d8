//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use greenbasket_core::{
    AddressId, Money, OrderId, OrderItemId, OrderStatus, PaymentMode, PaymentStatus, ProductId,
    UserId, VariantId,
};

/// An immutable-once-placed record of a purchase (domain type).
///
/// Created atomically with its items at checkout; afterwards mutated only
/// via status transitions, never deleted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// User who placed the order.
    pub user_id: UserId,
    /// Line items, snapshotted from the cart at checkout.
    pub items: Vec<OrderItem>,
    /// Authoritative total: Σ(price_at_purchase × quantity).
    pub total_amount: Money,
    /// Shipping address, owned by the same user.
    pub shipping_address_id: AddressId,
    /// Fulfilment status.
    pub status: OrderStatus,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// How the order is paid.
    pub payment_mode: PaymentMode,
    /// Carrier tracking reference.
    pub tracking_number: i32,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A line item on a placed order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Unique order-item ID.
    pub id: OrderItemId,
    /// Order this item belongs to.
    pub order_id: OrderId,
    /// Product purchased.
    pub product_id: ProductId,
    /// Specific variant, when one was chosen.
    pub variant_id: Option<VariantId>,
    /// Units purchased.
    pub quantity: i32,
    /// Price snapshot captured at purchase, immutable once placed.
    pub price_at_purchase: Money,
}

/// A candidate order, built from a cart and not yet persisted.
///
/// Carries the client-visible declared total so the validator can recompute
/// and cross-check it before anything is written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// User placing the order.
    pub user_id: UserId,
    /// Line items to persist with the order.
    pub items: Vec<NewOrderItem>,
    /// Declared total; must equal the recomputed sum of line totals.
    pub total_amount: Money,
    /// Shipping address reference.
    pub shipping_address_id: AddressId,
    /// Requested initial status.
    pub status: OrderStatus,
    /// Initial payment status.
    pub payment_status: PaymentStatus,
    /// Payment mode chosen at checkout.
    pub payment_mode: PaymentMode,
    /// Carrier tracking reference.
    pub tracking_number: i32,
}

/// A line item on a candidate order.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    /// Product being purchased.
    pub product_id: ProductId,
    /// Specific variant, when one was chosen in the cart.
    pub variant_id: Option<VariantId>,
    /// Units requested.
    pub quantity: i32,
    /// Price carried over from the cart's price-at-adding snapshot.
    pub price_at_purchase: Money,
}
