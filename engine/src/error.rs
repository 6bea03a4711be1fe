//! Error types for the Pitstop engine.

use crate::OperationId;
use thiserror::Error;

/// All possible errors from the Pitstop engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Bookkeeping errors
    #[error("operation already pending: {0}")]
    DuplicateOperation(OperationId),

    #[error("entity has no id: operation {0}")]
    MissingEntityId(OperationId),

    // Decoding errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("unsupported snapshot format version: {found} (max supported: {supported})")]
    UnsupportedFormat { found: u32, supported: u32 },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::DuplicateOperation("op-1".into());
        assert_eq!(err.to_string(), "operation already pending: op-1");

        let err = Error::UnsupportedFormat {
            found: 9,
            supported: 1,
        };
        assert_eq!(
            err.to_string(),
            "unsupported snapshot format version: 9 (max supported: 1)"
        );
    }
}
