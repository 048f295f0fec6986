//! Pattern file storage for the loom controller.
//!
//! This crate provides the storage collaborator behind the file-transfer commands:
//! fresh writable handles for incoming pattern files, header probes used by the
//! status report, and persistence of the last-known file name per target. Backends
//! are pluggable (host directory, in-memory).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod bmp;

use loom_wire::TargetKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// File name rejected before touching the backend
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
    /// Entry not found
    #[error("File not found: {0}")]
    NotFound(String),
    /// Read past the end of a file
    #[error("Short read from {name}: wanted {wanted} bytes at offset {offset}")]
    ShortRead {
        /// File name
        name: String,
        /// Requested offset
        offset: u64,
        /// Requested size
        wanted: usize,
    },
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Last-known file name per target, kept for status reporting
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCatalog {
    /// Body pattern file name
    pub body: Option<String>,
    /// Border pattern file name
    pub border: Option<String>,
}

impl TargetCatalog {
    /// Last-known name for a target
    pub fn name(&self, kind: TargetKind) -> Option<&str> {
        match kind {
            TargetKind::Body => self.body.as_deref(),
            TargetKind::Border => self.border.as_deref(),
        }
    }

    /// Record a new name for a target
    pub fn set(&mut self, kind: TargetKind, name: impl Into<String>) {
        let name = Some(name.into());
        match kind {
            TargetKind::Body => self.body = name,
            TargetKind::Border => self.border = name,
        }
    }
}

/// Exclusive write handle on one stored file
pub trait WriteHandle: Send {
    /// Append bytes
    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), StorageError>;

    /// Flush and close
    fn close(self: Box<Self>) -> Result<(), StorageError>;
}

/// Storage collaborator used by the transfer session and status report
pub trait FileStore: Send {
    /// Open a fresh writable file, replacing any existing file with that name
    fn open_writable(&self, name: &str) -> Result<Box<dyn WriteHandle>, StorageError>;

    /// Read `size` bytes at `offset` from a stored file
    fn read_header_field(&self, name: &str, offset: u64, size: usize)
        -> Result<Vec<u8>, StorageError>;

    /// Load the persisted target catalog (empty if none was stored)
    fn load_catalog(&self) -> Result<TargetCatalog, StorageError>;

    /// Persist the target catalog
    fn store_catalog(&self, catalog: &TargetCatalog) -> Result<(), StorageError>;
}

/// Storage backend configuration
#[derive(Clone, Debug, Default)]
pub enum StorageMode {
    /// In-memory storage (dev/tests only)
    #[default]
    InMemory,
    /// Files under a host directory
    Directory {
        /// Data directory path
        data_dir: PathBuf,
    },
}

// Re-export backend implementations
pub use backend::file::DirectoryStore;
pub use backend::mem::MemoryStore;
pub use bmp::{total_units, BMP_HEIGHT_OFFSET};

/// Create a store from configuration
pub fn open_store(mode: StorageMode) -> Result<Box<dyn FileStore>, StorageError> {
    match mode {
        StorageMode::InMemory => Ok(Box::new(MemoryStore::new())),
        StorageMode::Directory { data_dir } => Ok(Box::new(DirectoryStore::new(data_dir)?)),
    }
}

/// Reject names that would escape the store or cannot be stored
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
