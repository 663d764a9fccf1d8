//! Order validation.
//!
//! Before an order is durably created, every invariant that must hold for it
//! to be commercially valid is checked here. Validation is fail-fast: any
//! single failure voids the order, so the first one wins.

use greenbasket_core::Money;

use super::CheckoutError;
use crate::db::Storage;
use crate::models::NewOrder;

/// Validate a candidate order against current catalog and address state.
///
/// Checks, per line item and in order: positive quantity, product existence,
/// variant existence under that product, and stock coverage (the variant's
/// counter when a variant is named, the product's otherwise). Then across
/// the order: the declared total equals the recomputed
/// Σ(price_at_purchase × quantity), the status is an allowed initial value,
/// and the shipping address exists and belongs to the ordering user.
///
/// Read-only: performs no writes, so a failure leaves the cart untouched.
///
/// # Errors
///
/// Returns the first violated invariant as a [`CheckoutError`], or
/// `CheckoutError::Repository` if a lookup fails.
pub async fn validate_order(
    storage: &dyn Storage,
    order: &NewOrder,
) -> Result<(), CheckoutError> {
    let mut computed = Money::ZERO;

    for item in &order.items {
        if item.quantity <= 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }

        let product = storage
            .product(item.product_id)
            .await?
            .ok_or(CheckoutError::ProductNotFound(item.product_id))?;

        // Variant stock is tracked independently of the base product's.
        let available = match item.variant_id {
            Some(variant_id) => {
                product
                    .variant(variant_id)
                    .ok_or(CheckoutError::VariantNotFound(variant_id))?
                    .stock
            }
            None => product.stock,
        };

        if available < item.quantity {
            return Err(CheckoutError::InsufficientStock {
                product_id: item.product_id,
                variant_id: item.variant_id,
                requested: item.quantity,
                available,
            });
        }

        let line_total = item
            .price_at_purchase
            .checked_mul(i64::from(item.quantity))
            .and_then(|t| computed.checked_add(t))
            .ok_or(CheckoutError::TotalMismatch {
                declared: order.total_amount,
                computed,
            })?;
        computed = line_total;
    }

    // Guards against a client-supplied total that doesn't match
    // server-priced items.
    if computed != order.total_amount {
        return Err(CheckoutError::TotalMismatch {
            declared: order.total_amount,
            computed,
        });
    }

    if !order.status.is_allowed_initial() {
        return Err(CheckoutError::InvalidStatus(order.status));
    }

    let address = storage
        .address(order.shipping_address_id)
        .await?
        .ok_or(CheckoutError::AddressNotFound(order.shipping_address_id))?;
    if address.user_id != order.user_id {
        return Err(CheckoutError::AddressOwnershipMismatch(
            order.shipping_address_id,
        ));
    }

    Ok(())
}
