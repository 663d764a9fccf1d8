//! Workflow-level integration tests for the checkout pipeline.
//!
//! These drive the `Checkout` orchestrator directly over the in-memory
//! backend and assert on the state it leaves behind: stock counters, cart
//! presence, and order records.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use greenbasket_core::{Money, OrderStatus, PaymentMode, PaymentStatus, UserId};
use greenbasket_shop::checkout::{Checkout, CheckoutError, PaymentRequest};
use greenbasket_shop::db::{MemoryStorage, Storage};

fn setup() -> (Checkout, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (Checkout::new(storage.clone()), storage)
}

// ============================================================================
// Placement
// ============================================================================

#[tokio::test]
async fn test_placement_snapshots_cart_prices() {
    let (checkout, storage) = setup();
    let user = UserId::new(1);
    let product = storage.add_product("Kettle", Money::from_minor_units(500), 10);
    let address = storage.add_address(user);
    // The cart was filled before a price change: the order must carry the
    // price at adding, not the current catalog price.
    storage.add_cart_item(user, product.id, None, 2, Money::from_minor_units(450));

    let order = checkout
        .place_order(user, address.id, PaymentMode::Cod)
        .await
        .unwrap();

    assert_eq!(order.items[0].price_at_purchase, Money::from_minor_units(450));
    assert_eq!(order.total_amount, Money::from_minor_units(900));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);

    let after = storage.product(product.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 8);
    assert!(storage.cart_for_user(user).await.unwrap().is_none());
}

#[tokio::test]
async fn test_placement_with_variant_decrements_variant_counter() {
    let (checkout, storage) = setup();
    let user = UserId::new(1);
    let product = storage.add_product("Shirt", Money::from_minor_units(2000), 5);
    let variant = storage
        .add_variant(product.id, "Size", "M", Money::from_minor_units(2100), 4)
        .unwrap();
    let address = storage.add_address(user);
    storage.add_cart_item(user, product.id, Some(variant.id), 3, variant.price);

    let order = checkout
        .place_order(user, address.id, PaymentMode::Upi)
        .await
        .unwrap();
    assert_eq!(order.total_amount, Money::from_minor_units(6300));

    let after = storage.product(product.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 5, "base counter untouched");
    assert_eq!(after.variant(variant.id).unwrap().stock, 1);
}

#[tokio::test]
async fn test_failed_placement_preserves_cart_and_stock() {
    let (checkout, storage) = setup();
    let user = UserId::new(1);
    let product = storage.add_product("Lamp", Money::from_minor_units(900), 1);
    let address = storage.add_address(user);
    storage.add_cart_item(user, product.id, None, 3, product.price);

    let err = checkout
        .place_order(user, address.id, PaymentMode::Cod)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InsufficientStock { .. }));

    let after = storage.product(product.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 1);
    assert!(storage.cart_for_user(user).await.unwrap().is_some());
    assert!(checkout.list_orders(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_foreign_address_rejected() {
    let (checkout, storage) = setup();
    let user = UserId::new(1);
    let product = storage.add_product("Lamp", Money::from_minor_units(900), 10);
    let other_address = storage.add_address(UserId::new(2));
    storage.add_cart_item(user, product.id, None, 1, product.price);

    let err = checkout
        .place_order(user, other_address.id, PaymentMode::Cod)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::AddressOwnershipMismatch(_)));
    assert!(storage.cart_for_user(user).await.unwrap().is_some());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_concurrent_orders_for_last_unit() {
    let (checkout, storage) = setup();
    let alice = UserId::new(1);
    let bob = UserId::new(2);
    let product = storage.add_product("Limited", Money::from_minor_units(5000), 1);
    let alice_addr = storage.add_address(alice);
    let bob_addr = storage.add_address(bob);
    storage.add_cart_item(alice, product.id, None, 1, product.price);
    storage.add_cart_item(bob, product.id, None, 1, product.price);

    let (a, b) = tokio::join!(
        checkout.place_order(alice, alice_addr.id, PaymentMode::Cod),
        checkout.place_order(bob, bob_addr.id, PaymentMode::Cod),
    );

    // Exactly one order lands; the loser sees either the validator's stock
    // check or a commit-time conflict, depending on interleaving.
    let (winner, loser) = match (a, b) {
        (Ok(order), Err(err)) | (Err(err), Ok(order)) => (order, err),
        other => panic!("expected exactly one success, got {other:?}"),
    };
    assert_eq!(winner.total_amount, Money::from_minor_units(5000));
    assert!(matches!(
        loser,
        CheckoutError::InsufficientStock { .. } | CheckoutError::TransactionConflict(_)
    ));

    let after = storage.product(product.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 0);
    assert_eq!(checkout.list_orders(10, 0).await.unwrap().len(), 1);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_confirmed_order_restores_stock() {
    let (checkout, storage) = setup();
    let user = UserId::new(1);
    let product = storage.add_product("Mug", Money::from_minor_units(500), 10);
    let address = storage.add_address(user);
    storage.add_cart_item(user, product.id, None, 4, product.price);

    let order = checkout
        .place_order(user, address.id, PaymentMode::Cod)
        .await
        .unwrap();
    checkout
        .update_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap();

    let cancelled = checkout.cancel_order(user, order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    let after = storage.product(product.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 10);
}

#[tokio::test]
async fn test_cancel_after_fulfilment_started_rejected() {
    let (checkout, storage) = setup();
    let user = UserId::new(1);
    let product = storage.add_product("Mug", Money::from_minor_units(500), 10);
    let address = storage.add_address(user);
    storage.add_cart_item(user, product.id, None, 2, product.price);

    let order = checkout
        .place_order(user, address.id, PaymentMode::Cod)
        .await
        .unwrap();
    checkout
        .update_status(order.id, OrderStatus::Processing)
        .await
        .unwrap();

    let err = checkout.cancel_order(user, order.id).await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::NotCancellable(OrderStatus::Processing)
    ));
    // The decrement stays applied.
    let after = storage.product(product.id).await.unwrap().unwrap();
    assert_eq!(after.stock, 8);
}

// ============================================================================
// Payment
// ============================================================================

#[tokio::test]
async fn test_full_lifecycle_place_pay_deliver() {
    let (checkout, storage) = setup();
    let user = UserId::new(1);
    let product = storage.add_product("Mug", Money::from_minor_units(500), 10);
    let address = storage.add_address(user);
    storage.add_cart_item(user, product.id, None, 2, product.price);

    let order = checkout
        .place_order(user, address.id, PaymentMode::Cod)
        .await
        .unwrap();

    let paid = checkout
        .process_payment(
            user,
            order.id,
            PaymentRequest {
                mode: PaymentMode::CreditCard,
                amount: order.total_amount,
                transaction_id: Some("txn-42".to_owned()),
            },
        )
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Confirmed);
    assert_eq!(paid.payment_status, PaymentStatus::Completed);
    assert_eq!(paid.payment_mode, PaymentMode::CreditCard);

    let delivered = checkout
        .update_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    // A delivered order can no longer be cancelled.
    let err = checkout.cancel_order(user, order.id).await.unwrap_err();
    assert!(matches!(err, CheckoutError::NotCancellable(_)));
}

#[tokio::test]
async fn test_payment_does_not_demote_later_status() {
    let (checkout, storage) = setup();
    let user = UserId::new(1);
    let product = storage.add_product("Mug", Money::from_minor_units(500), 10);
    let address = storage.add_address(user);
    storage.add_cart_item(user, product.id, None, 1, product.price);

    let order = checkout
        .place_order(user, address.id, PaymentMode::Cod)
        .await
        .unwrap();
    checkout
        .update_status(order.id, OrderStatus::Shipping)
        .await
        .unwrap();

    // COD payment recorded on delivery; the order stays in shipping.
    let paid = checkout
        .process_payment(
            user,
            order.id,
            PaymentRequest {
                mode: PaymentMode::Cod,
                amount: order.total_amount,
                transaction_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Shipping);
    assert_eq!(paid.payment_status, PaymentStatus::Completed);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_order_listings_scoped_per_user() {
    let (checkout, storage) = setup();
    let alice = UserId::new(1);
    let bob = UserId::new(2);
    let product = storage.add_product("Mug", Money::from_minor_units(500), 100);
    let alice_addr = storage.add_address(alice);
    let bob_addr = storage.add_address(bob);

    storage.add_cart_item(alice, product.id, None, 1, product.price);
    let alice_order = checkout
        .place_order(alice, alice_addr.id, PaymentMode::Cod)
        .await
        .unwrap();
    storage.add_cart_item(bob, product.id, None, 2, product.price);
    checkout
        .place_order(bob, bob_addr.id, PaymentMode::Cod)
        .await
        .unwrap();

    let mine = checkout.list_orders_for_user(alice).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, alice_order.id);

    // Admin listing sees both; Bob cannot fetch Alice's order.
    assert_eq!(checkout.list_orders(10, 0).await.unwrap().len(), 2);
    let err = checkout.order(bob, alice_order.id).await.unwrap_err();
    assert!(matches!(err, CheckoutError::OrderNotFound(_)));
}
