//! The order-placement workflow.
//!
//! Converts a user's cart into a durable order:
//!
//! 1. Load the cart snapshot (items, quantities, price-at-adding).
//! 2. Build a candidate order with price-at-purchase snapshots.
//! 3. Validate every commercial invariant ([`validate`]).
//! 4. Commit order + stock decrements as one atomic unit.
//! 5. Best-effort cart teardown.
//!
//! Also owns order cancellation, admin status updates, and payment
//! recording. All operations take plain data and return result-or-error;
//! HTTP concerns live in `crate::routes`.

pub mod error;
pub mod flow;
pub mod validate;

pub use error::CheckoutError;
pub use flow::{Checkout, PaymentRequest};
pub use validate::validate_order;
