//! File transfer session.
//!
//! At most one pattern file is open at a time. The command channel opens and
//! closes it; the bulk channel appends raw bytes to it in between. The session
//! also keeps the last-known file name per target for the status report.

use crate::SessionError;
use loom_storage::{total_units, FileStore, TargetCatalog, WriteHandle};
use loom_wire::{FileStatus, TargetKind, TargetStatus};
use tracing::{debug, error, info, warn};

/// The file currently receiving bulk bytes
struct ActiveTransfer {
    kind: Option<TargetKind>,
    name: String,
    handle: Box<dyn WriteHandle>,
    bytes_written: u64,
}

/// Outcome of a finished transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    /// Target the file was written for; `None` for an unrecognised category
    pub kind: Option<TargetKind>,
    /// Stored file name
    pub name: String,
    /// Bytes received on the bulk channel
    pub bytes_written: u64,
}

/// Exclusive owner of the open write handle
pub struct TransferSession {
    store: Box<dyn FileStore>,
    active: Option<ActiveTransfer>,
    catalog: TargetCatalog,
}

impl TransferSession {
    /// Create a session over a store, restoring the persisted catalog
    pub fn new(store: Box<dyn FileStore>) -> Self {
        let catalog = match store.load_catalog() {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Starting with an empty target catalog: {}", e);
                TargetCatalog::default()
            }
        };

        Self {
            store,
            active: None,
            catalog,
        }
    }

    /// Open a fresh file for a target.
    ///
    /// Any transfer still open is finalized first. The last-known name for the
    /// target changes only when the open succeeds and the target is known; a file
    /// for an unrecognised category is still received but not reported.
    pub fn start(&mut self, kind: Option<TargetKind>, name: &str) -> Result<(), SessionError> {
        if self.active.is_some() {
            warn!("Transfer started while another is open; closing the previous file");
            self.finalize();
        }

        let handle = self.store.open_writable(name)?;
        info!("Receiving {} pattern {:?}", label(kind), name);

        if let Some(kind) = kind {
            self.catalog.set(kind, name);
            if let Err(e) = self.store.store_catalog(&self.catalog) {
                warn!("Failed to persist target catalog: {}", e);
            }
        }

        self.active = Some(ActiveTransfer {
            kind,
            name: name.to_string(),
            handle,
            bytes_written: 0,
        });
        Ok(())
    }

    /// Append bulk bytes to the open file. Without an open file the bytes are dropped.
    pub fn write_chunk(&mut self, bytes: &[u8]) -> Result<usize, SessionError> {
        let Some(active) = self.active.as_mut() else {
            debug!("Dropping {} bulk bytes: no transfer open", bytes.len());
            return Ok(0);
        };

        active.handle.write_chunk(bytes)?;
        active.bytes_written += bytes.len() as u64;
        Ok(bytes.len())
    }

    /// Close the open file, if any
    pub fn finalize(&mut self) -> Option<TransferSummary> {
        let active = self.active.take()?;
        let summary = TransferSummary {
            kind: active.kind,
            name: active.name,
            bytes_written: active.bytes_written,
        };

        match active.handle.close() {
            Ok(()) => info!(
                "Stored {} pattern {:?} ({} bytes)",
                label(summary.kind),
                summary.name,
                summary.bytes_written
            ),
            Err(e) => error!("Failed to close {:?}: {}", summary.name, e),
        }
        Some(summary)
    }

    /// Whether a file is open
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Target and name of the open file
    pub fn active_target(&self) -> Option<(Option<TargetKind>, &str)> {
        self.active
            .as_ref()
            .map(|active| (active.kind, active.name.as_str()))
    }

    /// Last-known names per target
    pub fn catalog(&self) -> &TargetCatalog {
        &self.catalog
    }

    /// Status of both targets for the get-file-status reply
    pub fn status(&self) -> FileStatus {
        let target = |kind: TargetKind| {
            let name = self.catalog.name(kind);
            TargetStatus {
                total_units: total_units(self.store.as_ref(), name),
                current_units: 0,
                name: name.unwrap_or_default().to_string(),
            }
        };

        FileStatus {
            body: target(TargetKind::Body),
            border: target(TargetKind::Border),
        }
    }
}

fn label(kind: Option<TargetKind>) -> String {
    kind.map_or_else(|| "UNTRACKED".to_string(), |kind| kind.to_string())
}
