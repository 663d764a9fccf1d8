//! Application state shared across handlers.

use std::sync::Arc;

use crate::checkout::Checkout;
use crate::config::ShopConfig;
use crate::db::Storage;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the storage backend and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ShopConfig,
    storage: Arc<dyn Storage>,
    checkout: Checkout,
}

impl AppState {
    /// Create a new application state over an injected storage backend.
    #[must_use]
    pub fn new(config: ShopConfig, storage: Arc<dyn Storage>) -> Self {
        let checkout = Checkout::new(storage.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                checkout,
            }),
        }
    }

    /// Get a reference to the shop configuration.
    #[must_use]
    pub fn config(&self) -> &ShopConfig {
        &self.inner.config
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    /// Get a reference to the checkout workflow.
    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }
}
