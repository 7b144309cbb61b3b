//! # orderhub-db-postgres
//!
//! PostgreSQL backend for the orderhub persistence port.
//!
//! Orders are stored across four tables (`orders`, `deliveries`, `payments`,
//! `items`); [`PostgresOrderStorage::save`] upserts all of them inside one
//! transaction so a concurrent reader sees the whole order or none of it.
//! Migrations are embedded in the binary and run on startup.

mod config;
mod error;
mod migrations;
mod pool;
mod storage;

pub use config::PostgresConfig;
pub use error::PostgresError;
pub use pool::create_pool;
pub use storage::PostgresOrderStorage;
