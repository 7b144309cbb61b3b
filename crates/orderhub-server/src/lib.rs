//! # orderhub-server
//!
//! Process wiring for the order service: configuration, tracing, the HTTP
//! read/write API, cache warm-up and the optional queue ingestion pipeline.

pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use server::{OrderhubServer, ServerBuilder};
