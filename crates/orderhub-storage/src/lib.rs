//! # orderhub-storage
//!
//! Persistence port for the orderhub service.
//!
//! This crate defines the [`OrderStorage`] trait that durable backends
//! implement, the [`StorageError`] taxonomy callers classify on, and an
//! in-memory implementation used by tests and local runs. The PostgreSQL
//! backend lives in its own crate (`orderhub-db-postgres`).
//!
//! The contract every backend must honor:
//! - `save` is an idempotent upsert of the order and all sub-entities,
//!   atomic as a unit: a concurrent reader sees all of them or none.
//! - `get_by_uid` is a point lookup that fails with
//!   [`StorageError::NotFound`] when the order is absent.
//! - `get_recent` returns up to `limit` most-recently-created orders, used
//!   once at startup to warm the cache.

mod error;
mod memory;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStorage;
pub use traits::OrderStorage;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynOrderStorage = std::sync::Arc<dyn OrderStorage>;
