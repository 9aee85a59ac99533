//! Error types for the engine.
//!
//! Every variant here is recovered locally: source failures degrade to
//! the next position tier, network failures leave events queued, and a
//! failed refresh keeps the previous geofence set. None of them stop the
//! monitoring loop.

use thiserror::Error;
use waymark_store::StorageError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The device denied access to a location or motion source.
    #[error("permission denied")]
    PermissionDenied,

    /// A device source is not available on this hardware.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The network is unreachable; queued work stays queued.
    #[error("network unavailable")]
    NetworkUnavailable,

    /// The remote service rejected or failed a request.
    #[error("remote sync failed: {0}")]
    RemoteSync(String),

    /// Local storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An awaited acquisition timed out.
    #[error("operation timed out")]
    Timeout,
}
