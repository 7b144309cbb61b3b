//! In-memory implementation of the storage port, for tests and local runs.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use orderhub_core::Order;

use crate::error::StorageError;
use crate::traits::OrderStorage;

/// In-memory order store backed by a lock-protected map.
///
/// Upserts replace the whole order, matching the wholesale-replacement
/// semantics of the PostgreSQL backend.
#[derive(Default)]
pub struct MemoryStorage {
    orders: RwLock<HashMap<String, Order>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.orders.read().expect("storage lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderStorage for MemoryStorage {
    async fn save(&self, order: &Order) -> Result<(), StorageError> {
        let mut orders = self.orders.write().expect("storage lock poisoned");
        orders.insert(order.order_uid.clone(), order.clone());
        Ok(())
    }

    async fn get_by_uid(&self, order_uid: &str) -> Result<Order, StorageError> {
        let orders = self.orders.read().expect("storage lock poisoned");
        orders
            .get(order_uid)
            .cloned()
            .ok_or_else(|| StorageError::not_found(order_uid))
    }

    async fn get_recent(&self, limit: usize) -> Result<HashMap<String, Order>, StorageError> {
        let orders = self.orders.read().expect("storage lock poisoned");
        let mut all: Vec<&Order> = orders.values().collect();
        all.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        Ok(all
            .into_iter()
            .take(limit)
            .map(|order| (order.order_uid.clone(), order.clone()))
            .collect())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
