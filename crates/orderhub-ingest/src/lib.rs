//! # orderhub-ingest
//!
//! The ingestion pipeline: pull order messages from a queue, decode and
//! validate them, persist through [`orderhub_storage::OrderStorage`], cache
//! the result, and acknowledge the message.
//!
//! The queue itself is behind the [`MessageSource`] and [`DeadLetterSink`]
//! ports; a channel-backed pair is provided for tests and local wiring.
//! Messages that still fail after the retry budget are forwarded to the
//! dead-letter sink and then acknowledged, so one poison message never
//! stalls the stream.

mod error;
mod pipeline;
mod retry;
mod source;

pub use error::IngestError;
pub use pipeline::IngestPipeline;
pub use retry::{BackoffMode, RetryPolicy};
pub use source::{
    ChannelDeadLetter, ChannelSource, DeadLetterError, DeadLetterSink, InboundMessage,
    MessageSource, SourceError, ERROR_REASON_HEADER,
};
