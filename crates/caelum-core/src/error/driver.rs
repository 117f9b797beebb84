//! Driver supervisor errors.

use thiserror::Error;

/// Errors raised by the driver process supervisor.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver executable could not be spawned; no process is recorded.
    #[error("Failed to spawn driver '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// An operation needed a running driver and none is recorded.
    #[error("No driver is running")]
    NotRunning,

    /// Pipe I/O with the child failed.
    #[error("Driver I/O error: {0}")]
    Io(#[from] std::io::Error),
}
