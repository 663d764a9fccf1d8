//! `PostgreSQL` storage backend.
//!
//! All queries are runtime-checked (`query_as` over `FromRow` row structs)
//! so the crate builds without a live database. Row structs carry raw column
//! values; conversion into domain types parses the status columns and fails
//! with `RepositoryError::DataCorruption` on bad data.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use greenbasket_core::{
    AddressId, CartId, CartItemId, Money, OrderId, OrderItemId, OrderStatus, PaymentMode,
    PaymentStatus, ProductId, UserId, VariantId,
};

use super::{RepositoryError, Storage};
use crate::models::{
    Address, Cart, CartItem, NewOrder, Order, OrderItem, Product, ProductVariant,
};

/// Production storage backend over a sqlx connection pool.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Create a new Postgres-backed storage.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn items_for_order(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, variant_id, quantity, price_at_purchase
            FROM shop.order_item
            WHERE order_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(order_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItemRow::into_domain).collect())
    }

    async fn order_with_items(
        &self,
        row: Option<OrderRow>,
    ) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let order_id = OrderId::new(row.id);
        let items = self.items_for_order(order_id).await?;
        Ok(Some(row.into_domain(items)?))
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn cart_for_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, user_id, created_at, updated_at
            FROM shop.cart
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, cart_id, product_id, variant_id, quantity, price_at_adding
            FROM shop.cart_item
            WHERE cart_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Cart {
            id: CartId::new(row.id),
            user_id: UserId::new(row.user_id),
            items: items.into_iter().map(CartItemRow::into_domain).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn delete_cart(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        // cart_item rows go with the cart via ON DELETE CASCADE.
        sqlx::query(r"DELETE FROM shop.cart WHERE id = $1")
            .bind(cart_id.as_i32())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, stock, active, reorder_threshold,
                   created_at, updated_at
            FROM shop.product
            WHERE id = $1
            ",
        )
        .bind(product_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let variants = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, product_id, name, value, price, stock, sku, active
            FROM shop.product_variant
            WHERE product_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(
            row.into_domain(variants.into_iter().map(VariantRow::into_domain).collect()),
        ))
    }

    async fn address(&self, address_id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT id, user_id, street, landmark, zip_code, city, state
            FROM shop.address
            WHERE id = $1
            ",
        )
        .bind(address_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AddressRow::into_domain))
    }

    async fn commit_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO shop."order"
                (user_id, total_amount, shipping_address_id, status,
                 payment_status, payment_mode, tracking_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, total_amount, shipping_address_id, status,
                      payment_status, payment_mode, tracking_number,
                      created_at, updated_at
            "#,
        )
        .bind(order.user_id.as_i32())
        .bind(order.total_amount.minor_units())
        .bind(order.shipping_address_id.as_i32())
        .bind(order.status.to_string())
        .bind(order.payment_status.to_string())
        .bind(order.payment_mode.to_string())
        .bind(order.tracking_number)
        .fetch_one(&mut *tx)
        .await?;

        let order_id = OrderId::new(row.id);
        let mut items = Vec::with_capacity(order.items.len());

        for item in &order.items {
            let item_row = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO shop.order_item
                    (order_id, product_id, variant_id, quantity, price_at_purchase)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, order_id, product_id, variant_id, quantity, price_at_purchase
                ",
            )
            .bind(order_id.as_i32())
            .bind(item.product_id.as_i32())
            .bind(item.variant_id.map(i32::from))
            .bind(item.quantity)
            .bind(item.price_at_purchase.minor_units())
            .fetch_one(&mut *tx)
            .await?;

            decrement_stock(&mut tx, item.product_id, item.variant_id, item.quantity).await?;

            items.push(item_row.into_domain());
        }

        tx.commit().await?;

        row.into_domain(items)
    }

    async fn order_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, total_amount, shipping_address_id, status,
                   payment_status, payment_mode, tracking_number, created_at, updated_at
            FROM shop."order"
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(order_id.as_i32())
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        self.order_with_items(row).await
    }

    async fn orders(&self, limit: i64, offset: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, total_amount, shipping_address_id, status,
                   payment_status, payment_mode, tracking_number, created_at, updated_at
            FROM shop."order"
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.items_for_order(OrderId::new(row.id)).await?;
            orders.push(row.into_domain(items)?);
        }
        Ok(orders)
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, total_amount, shipping_address_id, status,
                   payment_status, payment_mode, tracking_number, created_at, updated_at
            FROM shop."order"
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.items_for_order(OrderId::new(row.id)).await?;
            orders.push(row.into_domain(items)?);
        }
        Ok(orders)
    }

    async fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE shop."order"
            SET status = $1, updated_at = now()
            WHERE id = $2
            RETURNING id, user_id, total_amount, shipping_address_id, status,
                      payment_status, payment_mode, tracking_number, created_at, updated_at
            "#,
        )
        .bind(status.to_string())
        .bind(order_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        self.order_with_items(row).await?.ok_or(RepositoryError::NotFound)
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // The status guard lives in the UPDATE itself: a concurrent move
        // into fulfilment makes this match zero rows, and no stock is
        // restored.
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE shop."order"
            SET status = $1, updated_at = now()
            WHERE id = $2 AND status IN ('pending', 'confirmed')
            RETURNING id, user_id, total_amount, shipping_address_id, status,
                      payment_status, payment_mode, tracking_number, created_at, updated_at
            "#,
        )
        .bind(OrderStatus::Cancelled.to_string())
        .bind(order_id.as_i32())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let current: Option<(String,)> =
                sqlx::query_as(r#"SELECT status FROM shop."order" WHERE id = $1"#)
                    .bind(order_id.as_i32())
                    .fetch_optional(&mut *tx)
                    .await?;
            let (status_raw,) = current.ok_or(RepositoryError::NotFound)?;
            let status = OrderStatus::from_str(&status_raw).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid order status in database: {e}"))
            })?;
            return Err(RepositoryError::NotCancellable { status });
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, variant_id, quantity, price_at_purchase
            FROM shop.order_item
            WHERE order_id = $1
            ORDER BY id ASC
            ",
        )
        .bind(order_id.as_i32())
        .fetch_all(&mut *tx)
        .await?;

        // Cancellation only happens before fulfilment, so the reserved units
        // go back on the shelf.
        for item in &items {
            restore_stock(
                &mut tx,
                ProductId::new(item.product_id),
                item.variant_id.map(VariantId::new),
                item.quantity,
            )
            .await?;
        }

        tx.commit().await?;

        row.into_domain(items.into_iter().map(OrderItemRow::into_domain).collect())
    }

    async fn record_payment(
        &self,
        order_id: OrderId,
        mode: PaymentMode,
        payment_status: PaymentStatus,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE shop."order"
            SET payment_mode = $1, payment_status = $2, status = $3, updated_at = now()
            WHERE id = $4
            RETURNING id, user_id, total_amount, shipping_address_id, status,
                      payment_status, payment_mode, tracking_number, created_at, updated_at
            "#,
        )
        .bind(mode.to_string())
        .bind(payment_status.to_string())
        .bind(status.to_string())
        .bind(order_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        self.order_with_items(row).await?.ok_or(RepositoryError::NotFound)
    }
}

/// Decrement a stock counter inside a transaction.
///
/// The `stock >= quantity` guard makes the decrement a compare-and-set: when
/// a concurrent transaction already took the units, zero rows match and the
/// caller's transaction rolls back instead of driving the counter negative.
async fn decrement_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
) -> Result<(), RepositoryError> {
    let result = if let Some(variant_id) = variant_id {
        sqlx::query(
            r"
            UPDATE shop.product_variant
            SET stock = stock - $1
            WHERE id = $2 AND product_id = $3 AND stock >= $1
            ",
        )
        .bind(quantity)
        .bind(variant_id.as_i32())
        .bind(product_id.as_i32())
        .execute(&mut **tx)
        .await?
    } else {
        sqlx::query(
            r"
            UPDATE shop.product
            SET stock = stock - $1, updated_at = now()
            WHERE id = $2 AND stock >= $1
            ",
        )
        .bind(quantity)
        .bind(product_id.as_i32())
        .execute(&mut **tx)
        .await?
    };

    if result.rows_affected() == 0 {
        return Err(RepositoryError::OutOfStock { product_id });
    }
    Ok(())
}

/// Restore a stock counter inside a transaction (order cancellation).
async fn restore_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
) -> Result<(), RepositoryError> {
    if let Some(variant_id) = variant_id {
        sqlx::query(
            r"
            UPDATE shop.product_variant
            SET stock = stock + $1
            WHERE id = $2 AND product_id = $3
            ",
        )
        .bind(quantity)
        .bind(variant_id.as_i32())
        .bind(product_id.as_i32())
        .execute(&mut **tx)
        .await?;
    } else {
        sqlx::query(
            r"
            UPDATE shop.product
            SET stock = stock + $1, updated_at = now()
            WHERE id = $2
            ",
        )
        .bind(quantity)
        .bind(product_id.as_i32())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct CartRow {
    id: i32,
    user_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    cart_id: i32,
    product_id: i32,
    variant_id: Option<i32>,
    quantity: i32,
    price_at_adding: i64,
}

impl CartItemRow {
    fn into_domain(self) -> CartItem {
        CartItem {
            id: CartItemId::new(self.id),
            cart_id: CartId::new(self.cart_id),
            product_id: ProductId::new(self.product_id),
            variant_id: self.variant_id.map(VariantId::new),
            quantity: self.quantity,
            price_at_adding: Money::from_minor_units(self.price_at_adding),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: i64,
    stock: i32,
    active: bool,
    reorder_threshold: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_domain(self, variants: Vec<ProductVariant>) -> Product {
        Product {
            id: ProductId::new(self.id),
            name: self.name,
            description: self.description,
            price: Money::from_minor_units(self.price),
            stock: self.stock,
            active: self.active,
            reorder_threshold: self.reorder_threshold,
            variants,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: i32,
    product_id: i32,
    name: String,
    value: String,
    price: i64,
    stock: i32,
    sku: String,
    active: bool,
}

impl VariantRow {
    fn into_domain(self) -> ProductVariant {
        ProductVariant {
            id: VariantId::new(self.id),
            product_id: ProductId::new(self.product_id),
            name: self.name,
            value: self.value,
            price: Money::from_minor_units(self.price),
            stock: self.stock,
            sku: self.sku,
            active: self.active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: i32,
    user_id: i32,
    street: String,
    landmark: String,
    zip_code: String,
    city: String,
    state: String,
}

impl AddressRow {
    fn into_domain(self) -> Address {
        Address {
            id: AddressId::new(self.id),
            user_id: UserId::new(self.user_id),
            street: self.street,
            landmark: self.landmark,
            zip_code: self.zip_code,
            city: self.city,
            state: self.state,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    total_amount: i64,
    shipping_address_id: i32,
    status: String,
    payment_status: String,
    payment_mode: String,
    tracking_number: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_domain(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let status = OrderStatus::from_str(&self.status).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order status in database: {e}"))
        })?;
        let payment_status = PaymentStatus::from_str(&self.payment_status).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid payment status in database: {e}"))
        })?;
        let payment_mode = PaymentMode::from_str(&self.payment_mode).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid payment mode in database: {e}"))
        })?;

        Ok(Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            items,
            total_amount: Money::from_minor_units(self.total_amount),
            shipping_address_id: AddressId::new(self.shipping_address_id),
            status,
            payment_status,
            payment_mode,
            tracking_number: self.tracking_number,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    variant_id: Option<i32>,
    quantity: i32,
    price_at_purchase: i64,
}

impl OrderItemRow {
    fn into_domain(self) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(self.id),
            order_id: OrderId::new(self.order_id),
            product_id: ProductId::new(self.product_id),
            variant_id: self.variant_id.map(VariantId::new),
            quantity: self.quantity,
            price_at_purchase: Money::from_minor_units(self.price_at_purchase),
        }
    }
}
