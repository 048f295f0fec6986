//! Host directory backend

use crate::{validate_name, FileStore, StorageError, TargetCatalog, WriteHandle};
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Catalog file kept next to the pattern files
const CATALOG_FILE: &str = "targets.json";

/// Pattern files stored flat under one data directory
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    data_dir: PathBuf,
}

impl DirectoryStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        info!("Pattern storage mounted at {:?}", data_dir);
        Ok(Self { data_dir })
    }

    /// Root directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        if name == CATALOG_FILE {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.data_dir.join(name))
    }
}

/// Buffered handle on a file being received
struct DirectoryHandle {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl WriteHandle for DirectoryHandle {
    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), StorageError> {
        let DirectoryHandle { path, writer } = *self;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        debug!("Closed {:?}", path);
        Ok(())
    }
}

impl FileStore for DirectoryStore {
    fn open_writable(&self, name: &str) -> Result<Box<dyn WriteHandle>, StorageError> {
        let path = self.path_for(name)?;
        // File::create truncates an existing file of the same name
        let file = File::create(&path)?;
        debug!("Opened {:?} for writing", path);
        Ok(Box::new(DirectoryHandle {
            path,
            writer: BufWriter::new(file),
        }))
    }

    fn read_header_field(
        &self,
        name: &str,
        offset: u64,
        size: usize,
    ) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(name)?;
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        file.seek(SeekFrom::Start(offset))?;
        let mut field = vec![0u8; size];
        match file.read_exact(&mut field) {
            Ok(()) => Ok(field),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(StorageError::ShortRead {
                name: name.to_string(),
                offset,
                wanted: size,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn load_catalog(&self) -> Result<TargetCatalog, StorageError> {
        let path = self.data_dir.join(CATALOG_FILE);
        if !path.exists() {
            return Ok(TargetCatalog::default());
        }

        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(catalog) => {
                info!("Loaded target catalog: {:?}", catalog);
                Ok(catalog)
            }
            Err(e) => {
                warn!("Ignoring unreadable target catalog {:?}: {}", path, e);
                Ok(TargetCatalog::default())
            }
        }
    }

    fn store_catalog(&self, catalog: &TargetCatalog) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(catalog)?;
        std::fs::write(self.data_dir.join(CATALOG_FILE), content)?;
        Ok(())
    }
}
