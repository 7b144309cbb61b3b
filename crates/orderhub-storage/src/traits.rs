//! The storage trait all order backends implement.

use std::collections::HashMap;

use async_trait::async_trait;

use orderhub_core::Order;

use crate::error::StorageError;

/// Durable, transactional store for orders.
///
/// Implementations must be thread-safe (`Send + Sync`) and are used as
/// trait objects by the ingestion pipeline and the HTTP layer.
#[async_trait]
pub trait OrderStorage: Send + Sync {
    /// Idempotent upsert of the order and all of its sub-entities, atomic
    /// as a unit. Re-applying the same order leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure or constraint failures,
    /// never for "already exists".
    async fn save(&self, order: &Order) -> Result<(), StorageError>;

    /// Point lookup by order UID.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] when no such order is stored.
    async fn get_by_uid(&self, order_uid: &str) -> Result<Order, StorageError>;

    /// Up to `limit` most-recently-created orders, keyed by UID.
    async fn get_recent(&self, limit: usize) -> Result<HashMap<String, Order>, StorageError>;

    /// Connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), StorageError>;
}
