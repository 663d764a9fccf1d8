//! Domain types for the shop.
//!
//! These types represent validated domain objects separate from database
//! row types. They serialize to the JSON shapes the HTTP surface returns.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;

pub use address::Address;
pub use cart::{Cart, CartItem};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem};
pub use product::{Product, ProductVariant};
