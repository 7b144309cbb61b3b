//! # orderhub-core
//!
//! Domain model and validation rules for the orderhub service.
//!
//! This crate defines the [`Order`] aggregate as it travels through the
//! system (queue message body, storage row set, cache entry, API payload)
//! and the pure validation functions applied before an order is persisted.
//! It contains no I/O and no async code.

mod order;
mod validate;

pub use order::{Delivery, Item, Order, Payment};
pub use validate::{
    RESERVED_UIDS, ValidationError, validate_order, validate_order_at, validate_order_external,
};
