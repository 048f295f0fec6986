//! Session error types.

use loom_storage::StorageError;
use loom_wire::WireError;
use thiserror::Error;

/// Errors raised by the session layer
#[derive(Error, Debug)]
pub enum SessionError {
    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding error
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Storage collaborator error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
