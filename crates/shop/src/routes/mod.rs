//! HTTP route handlers for the shop.
//!
//! # Route Structure
//!
//! ```text
//! GET   /health                - Health check
//!
//! # Orders (requires auth)
//! POST  /orders                - Place an order from the caller's cart
//! GET   /orders/mine           - The caller's order history
//! GET   /orders/{id}           - Fetch one of the caller's orders
//! POST  /orders/{id}/cancel    - Cancel a pending/confirmed order
//! POST  /orders/{id}/payment   - Record a payment against an order
//!
//! # Admin
//! GET   /orders                - List all orders (paginated)
//! PATCH /orders/{id}/status    - Set an order's fulfilment status
//! ```

pub mod orders;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::place_order).get(orders::list_orders))
        .route("/mine", get(orders::my_orders))
        .route("/{id}", get(orders::get_order))
        .route("/{id}/cancel", post(orders::cancel_order))
        .route("/{id}/payment", post(orders::process_payment))
        .route("/{id}/status", patch(orders::update_status))
}

/// Create the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/orders", order_routes())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}
