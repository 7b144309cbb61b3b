//! Server assembly and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use orderhub_cache::OrderCache;
use orderhub_db_postgres::PostgresOrderStorage;
use orderhub_ingest::{DeadLetterSink, IngestPipeline, MessageSource};
use orderhub_storage::DynOrderStorage;

use crate::bootstrap::warm_cache;
use crate::config::AppConfig;
use crate::handlers::{build_router, AppState};

pub struct ServerBuilder {
    config: AppConfig,
    storage: Option<DynOrderStorage>,
    queue: Option<(Box<dyn MessageSource>, Arc<dyn DeadLetterSink>)>,
}

impl ServerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            storage: None,
            queue: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Injects a storage backend, bypassing the PostgreSQL setup. Used by
    /// tests and embedders.
    #[must_use]
    pub fn with_storage(mut self, storage: DynOrderStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Attaches a message source and its dead-letter sink. Without this the
    /// server runs HTTP-only.
    #[must_use]
    pub fn with_queue(
        mut self,
        source: Box<dyn MessageSource>,
        dead_letter: Arc<dyn DeadLetterSink>,
    ) -> Self {
        self.queue = Some((source, dead_letter));
        self
    }

    pub async fn build(self) -> anyhow::Result<OrderhubServer> {
        let storage: DynOrderStorage = match self.storage {
            Some(storage) => storage,
            None => {
                let pg = self
                    .config
                    .storage
                    .postgres
                    .as_ref()
                    .context("storage.postgres config is required")?;
                Arc::new(
                    PostgresOrderStorage::new(pg)
                        .await
                        .context("postgres storage initialization failed")?,
                )
            }
        };

        let cache = OrderCache::new(self.config.cache.ttl(), self.config.cache.capacity);
        warm_cache(&storage, &cache, self.config.cache.warm_limit).await;

        let pipeline = match self.queue {
            Some((source, dead_letter)) => {
                let pipeline = IngestPipeline::new(
                    storage.clone(),
                    cache.clone(),
                    dead_letter,
                    self.config.ingest.retry_policy(),
                );
                Some((pipeline, source))
            }
            None => {
                info!("no message source attached, queue ingestion disabled");
                None
            }
        };

        let app = build_router(AppState {
            cache: cache.clone(),
            storage,
        })
        .layer(TimeoutLayer::new(self.config.server.request_timeout()));

        Ok(OrderhubServer {
            addr: self.config.addr(),
            app,
            cache,
            pipeline,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct OrderhubServer {
    addr: SocketAddr,
    app: Router,
    cache: Arc<OrderCache>,
    pipeline: Option<(IngestPipeline, Box<dyn MessageSource>)>,
}

impl OrderhubServer {
    /// Serves until Ctrl+C, then stops the pipeline and the cache sweeper.
    pub async fn run(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let pipeline_task: Option<JoinHandle<()>> = self.pipeline.map(|(pipeline, source)| {
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move {
                pipeline.run(source, shutdown).await;
            })
        });

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        let _ = shutdown_tx.send(true);
        if let Some(task) = pipeline_task {
            if tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .is_err()
            {
                warn!("ingestion pipeline did not stop within 5s");
            }
        }
        self.cache.shutdown();

        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
