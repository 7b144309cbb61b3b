//! Error taxonomy for storage operations.
//!
//! The HTTP layer maps these onto status codes, so the variants distinguish
//! "not found" from infrastructure failure.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested order was not found.
    #[error("order not found: {order_uid}")]
    NotFound {
        /// UID of the order that was not found.
        order_uid: String,
    },

    /// Failed to reach the storage backend.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// A query or constraint failure inside the backend.
    #[error("internal storage error: {message}")]
    Internal { message: String },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(order_uid: impl Into<String>) -> Self {
        Self::NotFound {
            order_uid: order_uid.into(),
        }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error means the order does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StorageError::not_found("uid-123");
        assert_eq!(err.to_string(), "order not found: uid-123");

        let err = StorageError::connection("refused");
        assert_eq!(err.to_string(), "connection error: refused");
    }

    #[test]
    fn not_found_predicate() {
        assert!(StorageError::not_found("x").is_not_found());
        assert!(!StorageError::internal("boom").is_not_found());
    }
}
