//! In-memory storage backend for development and testing

use crate::{validate_name, FileStore, StorageError, TargetCatalog, WriteHandle};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-memory store. Clones share the same contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// File name -> contents
    files: Arc<DashMap<String, Vec<u8>>>,
    /// Persisted catalog
    catalog: Arc<Mutex<TargetCatalog>>,
    /// When set, every open fails
    read_only: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent opens fail, as a full or unmounted volume would
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Insert a file directly
    pub fn insert(&self, name: &str, contents: impl Into<Vec<u8>>) {
        self.files.insert(name.to_string(), contents.into());
    }

    /// Current contents of a file
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.get(name).map(|v| v.clone())
    }
}

/// Handle appending straight into the shared map
struct MemoryHandle {
    files: Arc<DashMap<String, Vec<u8>>>,
    name: String,
}

impl WriteHandle for MemoryHandle {
    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.files
            .entry(self.name.clone())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), StorageError> {
        debug!("Closed in-memory file {}", self.name);
        Ok(())
    }
}

impl FileStore for MemoryStore {
    fn open_writable(&self, name: &str) -> Result<Box<dyn WriteHandle>, StorageError> {
        validate_name(name)?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "store is read-only",
            )));
        }

        self.files.insert(name.to_string(), Vec::new());
        Ok(Box::new(MemoryHandle {
            files: Arc::clone(&self.files),
            name: name.to_string(),
        }))
    }

    fn read_header_field(
        &self,
        name: &str,
        offset: u64,
        size: usize,
    ) -> Result<Vec<u8>, StorageError> {
        let file = self
            .files
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(size);
        if end > file.len() {
            return Err(StorageError::ShortRead {
                name: name.to_string(),
                offset,
                wanted: size,
            });
        }
        Ok(file[start..end].to_vec())
    }

    fn load_catalog(&self) -> Result<TargetCatalog, StorageError> {
        Ok(self
            .catalog
            .lock()
            .map(|catalog| catalog.clone())
            .unwrap_or_default())
    }

    fn store_catalog(&self, catalog: &TargetCatalog) -> Result<(), StorageError> {
        if let Ok(mut stored) = self.catalog.lock() {
            *stored = catalog.clone();
        }
        Ok(())
    }
}
