//! The fetch/decode/validate/persist/cache/commit loop.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use orderhub_cache::OrderCache;
use orderhub_core::{validate_order, Order};
use orderhub_storage::DynOrderStorage;

use crate::error::IngestError;
use crate::retry::RetryPolicy;
use crate::source::{DeadLetterSink, InboundMessage, MessageSource, SourceError};

/// Drives messages from a [`MessageSource`] into storage and the cache.
///
/// Each message is decoded, validated, saved and cached; transient failures
/// are retried on the pipeline's [`RetryPolicy`] schedule. A message whose
/// retry budget is spent goes to the dead-letter sink and is then committed,
/// so redelivery never replays a known-bad payload.
pub struct IngestPipeline {
    storage: DynOrderStorage,
    cache: Arc<OrderCache>,
    dead_letter: Arc<dyn DeadLetterSink>,
    retry: RetryPolicy,
}

impl IngestPipeline {
    #[must_use]
    pub fn new(
        storage: DynOrderStorage,
        cache: Arc<OrderCache>,
        dead_letter: Arc<dyn DeadLetterSink>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            storage,
            cache,
            dead_letter,
            retry,
        }
    }

    /// Runs until the source closes or `shutdown` flips to `true`.
    pub async fn run(
        &self,
        mut source: Box<dyn MessageSource>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            max_retries = self.retry.max_retries,
            "ingestion pipeline started"
        );

        loop {
            if *shutdown.borrow() {
                info!("shutdown requested, stopping ingestion");
                break;
            }

            let message = tokio::select! {
                fetched = source.fetch() => match fetched {
                    Ok(message) => message,
                    Err(SourceError::Closed) => {
                        info!("message source closed, stopping ingestion");
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "fetch failed, continuing");
                        continue;
                    }
                },
                changed = shutdown.changed() => {
                    // A dropped sender means the server is gone; stop too.
                    if changed.is_err() {
                        info!("shutdown channel closed, stopping ingestion");
                        break;
                    }
                    continue;
                }
            };

            match self.process_with_retry(&message, &mut shutdown).await {
                Ok(()) => {}
                Err(IngestError::Cancelled) => {
                    info!("shutdown requested mid-message, stopping ingestion");
                    break;
                }
                Err(err) => {
                    warn!(
                        key = ?message.key,
                        reason = err.reason(),
                        error = %err,
                        "retry budget spent, dead-lettering message"
                    );
                    if let Err(dlq_err) = self
                        .dead_letter
                        .send(&message.payload, Some(err.reason()))
                        .await
                    {
                        // The message is still committed below; losing it to
                        // the DLQ beats blocking the whole stream on it.
                        error!(error = %dlq_err, "dead letter publish failed");
                    }
                }
            }

            if let Err(err) = source.commit(&message).await {
                warn!(error = %err, "commit failed, message may be redelivered");
            }
        }

        info!("ingestion pipeline stopped");
    }

    async fn process_with_retry(
        &self,
        message: &InboundMessage,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), IngestError> {
        let mut attempt = 0u32;
        loop {
            match self.process_once(message).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if attempt >= self.retry.max_retries {
                        return Err(err);
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "processing failed, backing off before retry"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => return Err(IngestError::Cancelled),
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn process_once(&self, message: &InboundMessage) -> Result<(), IngestError> {
        let order: Order = serde_json::from_slice(&message.payload)
            .map_err(|err| IngestError::Decode(err.to_string()))?;
        validate_order(&order)?;
        self.storage.save(&order).await?;
        debug!(order_uid = %order.order_uid, "order persisted");
        self.cache.set(order.order_uid.clone(), order);
        Ok(())
    }
}
