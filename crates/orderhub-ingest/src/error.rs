//! Error types for the ingestion pipeline.

use orderhub_core::ValidationError;
use orderhub_storage::StorageError;

/// Why a message failed to process.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The payload is not a well-formed order document.
    #[error("message decode failed: {0}")]
    Decode(String),

    /// The order decoded but violates a business rule.
    #[error("order validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Persisting the order failed.
    #[error("order persistence failed: {0}")]
    Storage(#[from] StorageError),

    /// Shutdown was requested while the message was being retried.
    #[error("processing cancelled by shutdown")]
    Cancelled,
}

impl IngestError {
    /// Reason tag attached to dead-lettered messages.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Decode(_) => "invalid_json",
            Self::Validation(_) => "invalid_order",
            Self::Storage(_) => "persistence_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_tags() {
        assert_eq!(IngestError::Decode("eof".into()).reason(), "invalid_json");
        assert_eq!(
            IngestError::Storage(StorageError::connection("down")).reason(),
            "persistence_failed"
        );
    }
}
