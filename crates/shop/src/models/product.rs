//! Product and variant domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use greenbasket_core::{Money, ProductId, VariantId};

/// A sellable product (domain type).
///
/// `stock` is the authoritative count of sellable units; it must never go
/// negative. When a product has variants, each variant tracks its own stock
/// independently of this counter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long-form description.
    pub description: String,
    /// Unit price in minor units.
    pub price: Money,
    /// Units available for sale (base product, not variants).
    pub stock: i32,
    /// Whether the product is currently sellable.
    pub active: bool,
    /// Stock level at which replenishment is flagged.
    pub reorder_threshold: i32,
    /// Variants of this product, if any.
    pub variants: Vec<ProductVariant>,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Find a variant of this product by ID.
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == id)
    }
}

/// A variant of a product, e.g. a size or colour (domain type).
///
/// Variant stock is tracked independently of the parent product's stock.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    /// Unique variant ID.
    pub id: VariantId,
    /// Parent product.
    pub product_id: ProductId,
    /// Variant dimension name (e.g. "Size").
    pub name: String,
    /// Variant dimension value (e.g. "XL").
    pub value: String,
    /// Unit price for this variant, in minor units.
    pub price: Money,
    /// Units of this variant available for sale.
    pub stock: i32,
    /// Stock-keeping unit code.
    pub sku: String,
    /// Whether the variant is currently sellable.
    pub active: bool,
}
