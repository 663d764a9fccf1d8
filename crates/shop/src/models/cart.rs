//! Cart domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use greenbasket_core::{CartId, CartItemId, Money, ProductId, UserId, VariantId};

/// A user's in-progress, pre-purchase collection of line items.
///
/// Each user has at most one active cart. The cart is destroyed on order
/// placement or explicit removal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Unique cart ID.
    pub id: CartId,
    /// Owning user.
    pub user_id: UserId,
    /// Line items in the cart.
    pub items: Vec<CartItem>,
    /// When the cart was created.
    pub created_at: DateTime<Utc>,
    /// When the cart was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A line item in a cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Unique cart-item ID.
    pub id: CartItemId,
    /// Cart this item belongs to.
    pub cart_id: CartId,
    /// Product being bought.
    pub product_id: ProductId,
    /// Specific variant, when the product has variants.
    pub variant_id: Option<VariantId>,
    /// Units requested. Must be positive.
    pub quantity: i32,
    /// Price snapshot captured when the item entered the cart.
    ///
    /// Immutable: later price changes on the product do not affect it.
    pub price_at_adding: Money,
}
