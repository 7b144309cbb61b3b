//! Queue ports and channel-backed implementations.
//!
//! [`MessageSource`] and [`DeadLetterSink`] are the pipeline's only view of
//! the message queue. The channel pair below backs tests and local wiring;
//! a broker client plugs in by implementing the same two traits.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// Header key carrying the failure reason on dead-lettered messages.
pub const ERROR_REASON_HEADER: &str = "error_reason";

/// A single message pulled from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Partition key, when the transport carries one.
    pub key: Option<String>,
    /// Raw message bytes, expected to be an order JSON document.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    #[must_use]
    pub fn new(key: Option<String>, payload: Vec<u8>) -> Self {
        Self { key, payload }
    }
}

/// Errors surfaced by a message source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source has ended; no further messages will arrive.
    #[error("message source closed")]
    Closed,

    /// A transient transport failure. The pipeline keeps fetching.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Where order messages come from.
///
/// `commit` acknowledges a message so it is not redelivered. The pipeline
/// commits only after the message has been persisted or dead-lettered.
#[async_trait]
pub trait MessageSource: Send {
    async fn fetch(&mut self) -> Result<InboundMessage, SourceError>;

    async fn commit(&mut self, message: &InboundMessage) -> Result<(), SourceError>;
}

/// Error publishing to the dead-letter sink.
#[derive(Debug, thiserror::Error)]
#[error("dead letter publish failed: {message}")]
pub struct DeadLetterError {
    message: String,
}

impl DeadLetterError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Where undeliverable messages go after the retry budget is spent.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Publishes the original payload, tagging it with the failure reason
    /// under [`ERROR_REASON_HEADER`] when one is given.
    async fn send(&self, payload: &[u8], reason: Option<&str>) -> Result<(), DeadLetterError>;
}

/// In-process [`MessageSource`] over a tokio channel.
///
/// Commits are recorded rather than sent anywhere; the commit log is
/// observable through [`ChannelSource::commit_log`].
pub struct ChannelSource {
    receiver: mpsc::Receiver<InboundMessage>,
    committed: Arc<Mutex<Vec<InboundMessage>>>,
}

impl ChannelSource {
    /// Creates a sender/source pair with the given channel capacity.
    #[must_use]
    pub fn pair(buffer: usize) -> (mpsc::Sender<InboundMessage>, Self) {
        let (sender, receiver) = mpsc::channel(buffer);
        (
            sender,
            Self {
                receiver,
                committed: Arc::new(Mutex::new(Vec::new())),
            },
        )
    }

    /// Shared handle to the list of committed messages, in commit order.
    #[must_use]
    pub fn commit_log(&self) -> Arc<Mutex<Vec<InboundMessage>>> {
        Arc::clone(&self.committed)
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn fetch(&mut self) -> Result<InboundMessage, SourceError> {
        self.receiver.recv().await.ok_or(SourceError::Closed)
    }

    async fn commit(&mut self, message: &InboundMessage) -> Result<(), SourceError> {
        self.committed
            .lock()
            .expect("commit log lock poisoned")
            .push(message.clone());
        debug!(key = ?message.key, "message committed");
        Ok(())
    }
}

/// In-process [`DeadLetterSink`] that records what was sent to it.
#[derive(Default)]
pub struct ChannelDeadLetter {
    sent: Mutex<Vec<(Vec<u8>, Option<String>)>>,
}

impl ChannelDeadLetter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload/reason pairs received so far, in arrival order.
    #[must_use]
    pub fn sent(&self) -> Vec<(Vec<u8>, Option<String>)> {
        self.sent.lock().expect("dead letter lock poisoned").clone()
    }
}

#[async_trait]
impl DeadLetterSink for ChannelDeadLetter {
    async fn send(&self, payload: &[u8], reason: Option<&str>) -> Result<(), DeadLetterError> {
        self.sent
            .lock()
            .expect("dead letter lock poisoned")
            .push((payload.to_vec(), reason.map(str::to_string)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn DeadLetterSink, _: &mut dyn MessageSource) {}

    #[tokio::test]
    async fn channel_source_delivers_then_closes() {
        let (sender, mut source) = ChannelSource::pair(4);
        sender
            .send(InboundMessage::new(Some("k".into()), b"{}".to_vec()))
            .await
            .unwrap();
        drop(sender);

        let message = source.fetch().await.unwrap();
        assert_eq!(message.key.as_deref(), Some("k"));
        assert!(matches!(source.fetch().await, Err(SourceError::Closed)));
    }

    #[tokio::test]
    async fn commits_are_recorded_in_order() {
        let (sender, mut source) = ChannelSource::pair(4);
        let log = source.commit_log();
        for key in ["a", "b"] {
            sender
                .send(InboundMessage::new(Some(key.into()), b"{}".to_vec()))
                .await
                .unwrap();
        }
        drop(sender);

        while let Ok(message) = source.fetch().await {
            source.commit(&message).await.unwrap();
        }

        let committed = log.lock().unwrap();
        let keys: Vec<_> = committed.iter().map(|m| m.key.clone().unwrap()).collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[tokio::test]
    async fn dead_letter_records_payload_and_reason() {
        let sink = ChannelDeadLetter::new();
        sink.send(b"broken", Some("invalid_json")).await.unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, b"broken");
        assert_eq!(sent[0].1.as_deref(), Some("invalid_json"));
    }
}
