//! Shipping address domain type.

use serde::Serialize;

use greenbasket_core::{AddressId, UserId};

/// A user's shipping address (domain type).
///
/// The checkout workflow only consults it for the ownership check; address
/// CRUD lives elsewhere.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Unique address ID.
    pub id: AddressId,
    /// User who owns this address.
    pub user_id: UserId,
    /// Street line.
    pub street: String,
    /// Nearby landmark.
    pub landmark: String,
    /// Postal code.
    pub zip_code: String,
    /// City.
    pub city: String,
    /// State or region.
    pub state: String,
}
