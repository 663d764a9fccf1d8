//! In-memory storage backend.
//!
//! Backs tests and local development where persistence is not required. A
//! single mutex over the whole state gives `commit_order` and `cancel_order`
//! the same all-or-nothing behavior the Postgres backend gets from a
//! transaction: checks and writes happen under one lock, so concurrent
//! commits serialize and a lost stock race surfaces as
//! `RepositoryError::OutOfStock` with nothing applied.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use greenbasket_core::{
    AddressId, CartId, CartItemId, Money, OrderId, OrderItemId, OrderStatus, PaymentMode,
    PaymentStatus, ProductId, UserId, VariantId,
};

use super::{RepositoryError, Storage};
use crate::models::{
    Address, Cart, CartItem, NewOrder, Order, OrderItem, Product, ProductVariant,
};

/// Thread-safe in-memory storage for tests and development.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, Cart>,
    addresses: BTreeMap<AddressId, Address>,
    orders: BTreeMap<OrderId, Order>,
    next_id: i32,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("state mutex poisoned")
    }

    /// Seed a product without variants.
    pub fn add_product(&self, name: &str, price: Money, stock: i32) -> Product {
        let mut inner = self.lock();
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(inner.next_id()),
            name: name.to_owned(),
            description: String::new(),
            price,
            stock,
            active: true,
            reorder_threshold: 0,
            variants: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        inner.products.insert(product.id, product.clone());
        product
    }

    /// Seed a variant under an existing product.
    ///
    /// Returns `None` if the product doesn't exist.
    pub fn add_variant(
        &self,
        product_id: ProductId,
        name: &str,
        value: &str,
        price: Money,
        stock: i32,
    ) -> Option<ProductVariant> {
        let mut inner = self.lock();
        let id = VariantId::new(inner.next_id());
        let product = inner.products.get_mut(&product_id)?;
        let variant = ProductVariant {
            id,
            product_id,
            name: name.to_owned(),
            value: value.to_owned(),
            price,
            stock,
            sku: format!("SKU-{id}"),
            active: true,
        };
        product.variants.push(variant.clone());
        Some(variant)
    }

    /// Seed an address for a user.
    pub fn add_address(&self, user_id: UserId) -> Address {
        let mut inner = self.lock();
        let address = Address {
            id: AddressId::new(inner.next_id()),
            user_id,
            street: "42 Basket Lane".to_owned(),
            landmark: String::new(),
            zip_code: "560001".to_owned(),
            city: "Bengaluru".to_owned(),
            state: "Karnataka".to_owned(),
        };
        inner.addresses.insert(address.id, address.clone());
        address
    }

    /// Seed a cart with no items.
    ///
    /// Returns the existing cart if the user already has one.
    pub fn add_empty_cart(&self, user_id: UserId) -> Cart {
        let mut inner = self.lock();
        if let Some(cart) = inner.carts.values().find(|c| c.user_id == user_id) {
            return cart.clone();
        }
        let now = Utc::now();
        let cart = Cart {
            id: CartId::new(inner.next_id()),
            user_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        inner.carts.insert(cart.id, cart.clone());
        cart
    }

    /// Add a line item to the user's cart, creating the cart on demand.
    pub fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: i32,
        price_at_adding: Money,
    ) -> CartItem {
        let mut inner = self.lock();
        let now = Utc::now();

        let cart_id = inner
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .map(|c| c.id);
        let cart_id = match cart_id {
            Some(id) => id,
            None => {
                let id = CartId::new(inner.next_id());
                inner.carts.insert(
                    id,
                    Cart {
                        id,
                        user_id,
                        items: Vec::new(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                id
            }
        };

        let item = CartItem {
            id: CartItemId::new(inner.next_id()),
            cart_id,
            product_id,
            variant_id,
            quantity,
            price_at_adding,
        };
        let cart = inner
            .carts
            .get_mut(&cart_id)
            .expect("cart inserted above");
        cart.items.push(item.clone());
        cart.updated_at = now;
        item
    }
}

/// Look up a stock counter for a (product, variant) pair.
fn available_stock(
    products: &BTreeMap<ProductId, Product>,
    product_id: ProductId,
    variant_id: Option<VariantId>,
) -> Result<i32, RepositoryError> {
    let product = products
        .get(&product_id)
        .ok_or(RepositoryError::OutOfStock { product_id })?;
    match variant_id {
        Some(variant_id) => product
            .variant(variant_id)
            .map(|v| v.stock)
            .ok_or(RepositoryError::OutOfStock { product_id }),
        None => Ok(product.stock),
    }
}

fn adjust_stock(
    products: &mut BTreeMap<ProductId, Product>,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    delta: i32,
) {
    let Some(product) = products.get_mut(&product_id) else {
        return;
    };
    match variant_id {
        Some(variant_id) => {
            if let Some(variant) = product.variants.iter_mut().find(|v| v.id == variant_id) {
                variant.stock += delta;
            }
        }
        None => product.stock += delta,
    }
    product.updated_at = Utc::now();
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn cart_for_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let inner = self.lock();
        Ok(inner.carts.values().find(|c| c.user_id == user_id).cloned())
    }

    async fn delete_cart(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        inner.carts.remove(&cart_id);
        Ok(())
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let inner = self.lock();
        Ok(inner.products.get(&product_id).cloned())
    }

    async fn address(&self, address_id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let inner = self.lock();
        Ok(inner.addresses.get(&address_id).cloned())
    }

    async fn commit_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut inner = self.lock();

        // Check every decrement before applying any, so a failure leaves
        // no partial state.
        for item in &order.items {
            let available = available_stock(&inner.products, item.product_id, item.variant_id)?;
            if available < item.quantity {
                return Err(RepositoryError::OutOfStock {
                    product_id: item.product_id,
                });
            }
        }

        for item in &order.items {
            adjust_stock(
                &mut inner.products,
                item.product_id,
                item.variant_id,
                -item.quantity,
            );
        }

        let now = Utc::now();
        let order_id = OrderId::new(inner.next_id());
        let items = order
            .items
            .iter()
            .map(|item| OrderItem {
                id: OrderItemId::new(inner.next_id()),
                order_id,
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                price_at_purchase: item.price_at_purchase,
            })
            .collect();

        let persisted = Order {
            id: order_id,
            user_id: order.user_id,
            items,
            total_amount: order.total_amount,
            shipping_address_id: order.shipping_address_id,
            status: order.status,
            payment_status: order.payment_status,
            payment_mode: order.payment_mode,
            tracking_number: order.tracking_number,
            created_at: now,
            updated_at: now,
        };
        inner.orders.insert(order_id, persisted.clone());
        Ok(persisted)
    }

    async fn order_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let inner = self.lock();
        Ok(inner
            .orders
            .get(&order_id)
            .filter(|o| o.user_id == user_id)
            .cloned())
    }

    async fn orders(&self, limit: i64, offset: i64) -> Result<Vec<Order>, RepositoryError> {
        let inner = self.lock();
        let mut all: Vec<Order> = inner.orders.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(all
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let inner = self.lock();
        let mut mine: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(mine)
    }

    async fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut inner = self.lock();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(RepositoryError::NotFound)?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<Order, RepositoryError> {
        let mut inner = self.lock();
        let mut order = inner
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;

        // Same guard the Postgres backend puts in its UPDATE: checked under
        // the lock, so a concurrent move into fulfilment can't slip through.
        if !order.status.is_cancellable() {
            return Err(RepositoryError::NotCancellable {
                status: order.status,
            });
        }

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();

        let restores: Vec<(ProductId, Option<VariantId>, i32)> = order
            .items
            .iter()
            .map(|i| (i.product_id, i.variant_id, i.quantity))
            .collect();
        for (product_id, variant_id, quantity) in restores {
            adjust_stock(&mut inner.products, product_id, variant_id, quantity);
        }

        inner.orders.insert(order_id, order.clone());
        Ok(order)
    }

    async fn record_payment(
        &self,
        order_id: OrderId,
        mode: PaymentMode,
        payment_status: PaymentStatus,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut inner = self.lock();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(RepositoryError::NotFound)?;
        order.payment_mode = mode;
        order.payment_status = payment_status;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn draft(user_id: UserId, address_id: AddressId, items: Vec<crate::models::NewOrderItem>) -> NewOrder {
        let total = items
            .iter()
            .map(|i| i.price_at_purchase.minor_units() * i64::from(i.quantity))
            .sum();
        NewOrder {
            user_id,
            items,
            total_amount: Money::from_minor_units(total),
            shipping_address_id: address_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_mode: PaymentMode::Cod,
            tracking_number: 123_456,
        }
    }

    #[tokio::test]
    async fn test_commit_order_decrements_stock() {
        let storage = MemoryStorage::new();
        let user = UserId::new(1);
        let product = storage.add_product("Mug", Money::from_minor_units(500), 10);
        let address = storage.add_address(user);

        let order = storage
            .commit_order(draft(
                user,
                address.id,
                vec![crate::models::NewOrderItem {
                    product_id: product.id,
                    variant_id: None,
                    quantity: 2,
                    price_at_purchase: product.price,
                }],
            ))
            .await
            .unwrap();

        assert_eq!(order.total_amount, Money::from_minor_units(1000));
        assert_eq!(order.items.len(), 1);
        let after = storage.product(product.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 8);
    }

    #[tokio::test]
    async fn test_commit_order_out_of_stock_leaves_no_partial_state() {
        let storage = MemoryStorage::new();
        let user = UserId::new(1);
        let plenty = storage.add_product("Plate", Money::from_minor_units(300), 10);
        let scarce = storage.add_product("Bowl", Money::from_minor_units(400), 1);
        let address = storage.add_address(user);

        let err = storage
            .commit_order(draft(
                user,
                address.id,
                vec![
                    crate::models::NewOrderItem {
                        product_id: plenty.id,
                        variant_id: None,
                        quantity: 2,
                        price_at_purchase: plenty.price,
                    },
                    crate::models::NewOrderItem {
                        product_id: scarce.id,
                        variant_id: None,
                        quantity: 2,
                        price_at_purchase: scarce.price,
                    },
                ],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RepositoryError::OutOfStock { product_id } if product_id == scarce.id
        ));
        // Nothing was applied, including the decrement that would have succeeded.
        let plenty_after = storage.product(plenty.id).await.unwrap().unwrap();
        assert_eq!(plenty_after.stock, 10);
        assert!(storage.orders(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_variant_stock_tracked_independently() {
        let storage = MemoryStorage::new();
        let user = UserId::new(1);
        let product = storage.add_product("Shirt", Money::from_minor_units(2000), 5);
        let variant = storage
            .add_variant(product.id, "Size", "XL", Money::from_minor_units(2200), 3)
            .unwrap();
        let address = storage.add_address(user);

        storage
            .commit_order(draft(
                user,
                address.id,
                vec![crate::models::NewOrderItem {
                    product_id: product.id,
                    variant_id: Some(variant.id),
                    quantity: 2,
                    price_at_purchase: variant.price,
                }],
            ))
            .await
            .unwrap();

        let after = storage.product(product.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 5, "base stock untouched");
        assert_eq!(after.variant(variant.id).unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_cancel_order_restores_stock() {
        let storage = MemoryStorage::new();
        let user = UserId::new(1);
        let product = storage.add_product("Mug", Money::from_minor_units(500), 10);
        let address = storage.add_address(user);

        let order = storage
            .commit_order(draft(
                user,
                address.id,
                vec![crate::models::NewOrderItem {
                    product_id: product.id,
                    variant_id: None,
                    quantity: 4,
                    price_at_purchase: product.price,
                }],
            ))
            .await
            .unwrap();

        let cancelled = storage.cancel_order(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        let after = storage.product(product.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 10);
    }

    #[tokio::test]
    async fn test_cancel_order_guard_holds_at_storage_level() {
        let storage = MemoryStorage::new();
        let user = UserId::new(1);
        let product = storage.add_product("Mug", Money::from_minor_units(500), 10);
        let address = storage.add_address(user);

        let order = storage
            .commit_order(draft(
                user,
                address.id,
                vec![crate::models::NewOrderItem {
                    product_id: product.id,
                    variant_id: None,
                    quantity: 2,
                    price_at_purchase: product.price,
                }],
            ))
            .await
            .unwrap();

        // An order that moved into fulfilment must not be cancellable even
        // by a direct storage call, as a racing caller's stale read would
        // make one.
        storage
            .set_order_status(order.id, OrderStatus::Shipping)
            .await
            .unwrap();
        let err = storage.cancel_order(order.id).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::NotCancellable {
                status: OrderStatus::Shipping
            }
        ));

        // No stock restored, status untouched.
        let after = storage.product(product.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 8);
        let kept = storage.order_for_user(user, order.id).await.unwrap().unwrap();
        assert_eq!(kept.status, OrderStatus::Shipping);
    }

    #[tokio::test]
    async fn test_cart_roundtrip_and_delete() {
        let storage = MemoryStorage::new();
        let user = UserId::new(7);
        let product = storage.add_product("Pen", Money::from_minor_units(150), 100);

        assert!(storage.cart_for_user(user).await.unwrap().is_none());
        storage.add_cart_item(user, product.id, None, 3, product.price);
        let cart = storage.cart_for_user(user).await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);

        storage.delete_cart(cart.id).await.unwrap();
        assert!(storage.cart_for_user(user).await.unwrap().is_none());
    }
}
