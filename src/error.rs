//! Error types shared across the transport and core layers.
//!
//! Per-file failures are data, not control flow: they are accumulated into
//! outcome objects and never abort a batch. Only transport unavailability
//! is fatal to a whole operation.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a [`Transport`](crate::transport::Transport)
/// implementation or by the core when bounding transport calls.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport process or binary is missing. Fatal to the whole
    /// operation; the core never retries this.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// An operation exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The requested device is absent from the latest snapshot.
    #[error("device '{0}' not found")]
    DeviceNotFound(String),

    /// The underlying adb command ran but reported failure.
    #[error("adb command failed: {0}")]
    Command(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reason a single planned file failed to copy.
///
/// Recorded per file in the execution outcome; execution always proceeds
/// to the next file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("transfer timed out")]
    Timeout,

    #[error("{0}")]
    Transport(String),
}

impl From<TransportError> for TransferError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => TransferError::Timeout,
            other => TransferError::Transport(other.to_string()),
        }
    }
}
