//! Storage layer for the shop.
//!
//! # Tables (schema `shop`)
//!
//! - `product` / `product_variant` - catalog with per-row stock counters
//! - `cart` / `cart_item` - a user's active cart with price-at-adding snapshots
//! - `"order"` / `order_item` - placed orders with price-at-purchase snapshots
//! - `address` - shipping addresses (consulted for the ownership check)
//!
//! # Backends
//!
//! Storage is an injected dependency behind the [`Storage`] trait so the
//! checkout workflow never touches a global handle:
//!
//! - [`PgStorage`] - production backend over a sqlx `PgPool`
//! - [`MemoryStorage`] - mutex-guarded maps for tests and local development
//!
//! # Migrations
//!
//! Migrations live in `crates/shop/migrations/` and are embedded via
//! `sqlx::migrate!`; `main` applies them on startup.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use greenbasket_core::{AddressId, CartId, OrderId, OrderStatus, PaymentMode, PaymentStatus, ProductId, UserId};

use crate::models::{Address, Cart, NewOrder, Order, Product};

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate cart for a user).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// `cancel_order` found the order past its cancellable statuses.
    ///
    /// Raised inside the cancellation's atomic unit, so a concurrent status
    /// update to `processing` or later can never race a cancel into
    /// restoring stock for an order already in fulfilment.
    #[error("order in '{status}' status can no longer be cancelled")]
    NotCancellable {
        /// The status the order held at cancellation time.
        status: OrderStatus,
    },

    /// A conditional stock decrement found fewer units than required.
    ///
    /// Raised at commit time when a concurrent order exhausted the counter
    /// between validation and write; the surrounding transaction rolls back.
    #[error("insufficient stock for product {product_id} at commit time")]
    OutOfStock {
        /// Product whose counter could not cover the decrement.
        product_id: ProductId,
    },
}

/// Persistence surface required by the checkout workflow.
///
/// Implementations must make [`commit_order`](Storage::commit_order) and
/// [`cancel_order`](Storage::cancel_order) atomic: either every write in the
/// operation lands or none does.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Get a user's active cart with its line items, if one exists.
    ///
    /// Side effect free (the cart snapshot reader).
    async fn cart_for_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError>;

    /// Delete a cart and its items.
    async fn delete_cart(&self, cart_id: CartId) -> Result<(), RepositoryError>;

    /// Get a product with its variants.
    async fn product(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Get a shipping address.
    async fn address(&self, address_id: AddressId) -> Result<Option<Address>, RepositoryError>;

    /// Persist a validated order and apply stock decrements atomically.
    ///
    /// Inserts the order row and all item rows, then decrements each item's
    /// product (or variant) stock counter with a server-side conditional
    /// update. If any counter cannot cover its decrement the whole operation
    /// rolls back and `RepositoryError::OutOfStock` is returned; no partial
    /// state is ever visible.
    async fn commit_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    /// Get an order owned by the given user.
    async fn order_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// List orders across all users, newest first (admin).
    async fn orders(&self, limit: i64, offset: i64) -> Result<Vec<Order>, RepositoryError>;

    /// List a user's orders, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Set an order's fulfilment status.
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    async fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;

    /// Mark an order cancelled and restore its stock decrements atomically.
    ///
    /// The status guard is part of the atomic unit: only a `pending` or
    /// `confirmed` order is cancelled, and a concurrent transition into
    /// fulfilment surfaces as `RepositoryError::NotCancellable` with nothing
    /// applied. Returns `RepositoryError::NotFound` if the order doesn't
    /// exist.
    async fn cancel_order(&self, order_id: OrderId) -> Result<Order, RepositoryError>;

    /// Record a completed payment against an order.
    ///
    /// Updates payment mode, payment status, and fulfilment status in one
    /// write. Returns `RepositoryError::NotFound` if the order doesn't exist.
    async fn record_payment(
        &self,
        order_id: OrderId,
        mode: PaymentMode,
        payment_status: PaymentStatus,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply embedded migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
