use std::time::Duration;

use uuid::Uuid;

/// Errors reported at the GATT transport boundary.
///
/// Values are cloneable so they can travel inside [`crate::TransportEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The stack refused to start the operation.
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    /// The link dropped while the operation was outstanding.
    #[error("link lost")]
    LinkLost,

    /// The expected GATT service was not offered by the device.
    #[error("service {0} not offered by device")]
    ServiceMissing(Uuid),

    /// The operation completed with a non-success GATT status.
    #[error("gatt operation failed with status {status:#04x}")]
    Gatt { status: u8 },

    /// No completion arrived within the configured deadline.
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),

    /// The transport has been released.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
