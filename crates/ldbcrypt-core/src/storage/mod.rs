//! File storage rooted at one directory.
//!
//! [`FileStorage`] hands out [`StorageFile`]s for LevelDB-style file
//! descriptors. With a key configured every file is an [`EncryptedFile`];
//! without one the files are [`PlainFile`]s.

pub mod state;

use std::{
    fmt,
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, instrument, warn};

use crate::crypto::CipherKey;
use crate::fs::error::{FileContext, StorageError};
use crate::fs::{EncryptedFile, FileDesc, PlainFile, StorageFile};

pub use state::{
    DirectorySyncer, FileSystemState, FsDirectorySyncer, LogSink, TracingLogSink,
};

/// Options for opening a [`FileStorage`].
#[derive(Clone, Default)]
pub struct StorageOptions {
    key: Option<CipherKey>,
    log_sink: Option<Arc<dyn LogSink>>,
    dir_syncer: Option<Arc<dyn DirectorySyncer>>,
}

impl StorageOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt every file with the raw AES key `key`.
    ///
    /// # Errors
    ///
    /// [`StorageError::Crypto`] if `key` is not 16, 24 or 32 bytes long.
    pub fn with_key(mut self, key: &[u8]) -> Result<Self, StorageError> {
        self.key = Some(CipherKey::new(key)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_cipher_key(mut self, key: CipherKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Route storage diagnostics to `sink` instead of `tracing`.
    #[must_use]
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_directory_syncer(mut self, syncer: Arc<dyn DirectorySyncer>) -> Self {
        self.dir_syncer = Some(syncer);
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }
}

impl fmt::Debug for StorageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageOptions")
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("custom_log_sink", &self.log_sink.is_some())
            .field("custom_dir_syncer", &self.dir_syncer.is_some())
            .finish()
    }
}

/// A directory of storage files sharing one [`FileSystemState`].
pub struct FileStorage {
    state: Arc<FileSystemState>,
    key: Option<CipherKey>,
}

impl FileStorage {
    /// Open the storage rooted at `path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// [`StorageError::Io`] if the directory cannot be created.
    #[instrument(level = "debug", skip_all)]
    pub fn new(path: impl AsRef<Path>, options: StorageOptions) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path).map_err(|e| {
            StorageError::io_with_context(e, FileContext::new().with_path(path.clone()))
        })?;

        let StorageOptions {
            key,
            log_sink,
            dir_syncer,
        } = options;
        let log_sink = log_sink.unwrap_or_else(|| Arc::new(TracingLogSink::new(path.clone())));
        let dir_syncer = dir_syncer.unwrap_or_else(|| Arc::new(FsDirectorySyncer));
        let state = FileSystemState::with_parts(path, log_sink, dir_syncer).into_shared();

        debug!(path = %state.path().display(), encrypted = key.is_some(), "Storage opened");
        Ok(Self { state, key })
    }

    pub fn path(&self) -> &Path {
        self.state.path()
    }

    /// Shared bookkeeping for this storage root.
    pub fn state(&self) -> &Arc<FileSystemState> {
        &self.state
    }

    /// Number of files opened and not yet closed.
    pub fn open_count(&self) -> i64 {
        self.state.open_count()
    }

    pub fn file_path(&self, desc: FileDesc) -> PathBuf {
        self.state.path().join(desc.file_name())
    }

    /// Create `desc`, discarding any previous contents.
    ///
    /// # Errors
    ///
    /// [`StorageError::Io`] if the file cannot be created, plus anything
    /// [`EncryptedFile::open`] returns.
    pub fn create(&self, desc: FileDesc) -> Result<Box<dyn StorageFile>, StorageError> {
        let file = self.open_raw(desc, true)?;
        self.wrap(file, desc)
    }

    /// Open `desc` for appending, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// As [`FileStorage::create`]; an existing encrypted file with an invalid
    /// layout yields [`StorageError::CorruptFile`].
    pub fn open_append(&self, desc: FileDesc) -> Result<Box<dyn StorageFile>, StorageError> {
        let file = self.open_raw(desc, false)?;
        self.wrap(file, desc)
    }

    /// Storage files present in the directory, in no particular order.
    ///
    /// Names that are not storage file names are skipped.
    ///
    /// # Errors
    ///
    /// [`StorageError::Io`] if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<FileDesc>, StorageError> {
        let context = FileContext::new().with_path(self.path());
        let entries =
            fs::read_dir(self.path()).map_err(|e| StorageError::io_with_context(e, context.clone()))?;

        let mut descs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io_with_context(e, context.clone()))?;
            if let Some(desc) = entry.file_name().to_str().and_then(FileDesc::parse) {
                descs.push(desc);
            }
        }
        Ok(descs)
    }

    /// Delete `desc` from the directory.
    ///
    /// # Errors
    ///
    /// [`StorageError::Io`] if the file cannot be removed.
    pub fn remove(&self, desc: FileDesc) -> Result<(), StorageError> {
        let path = self.file_path(desc);
        fs::remove_file(&path).map_err(|e| {
            warn!(file = %desc, error = %e, "Failed to remove storage file");
            StorageError::io_with_context(e, FileContext::new().with_desc(desc).with_path(path))
        })?;
        debug!(file = %desc, "Storage file removed");
        Ok(())
    }

    fn open_raw(&self, desc: FileDesc, truncate: bool) -> Result<File, StorageError> {
        let path = self.file_path(desc);
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(&path)
            .map_err(|e| {
                StorageError::io_with_context(e, FileContext::new().with_desc(desc).with_path(path))
            })
    }

    fn wrap(&self, file: File, desc: FileDesc) -> Result<Box<dyn StorageFile>, StorageError> {
        let fs = Arc::clone(&self.state);
        match &self.key {
            Some(key) => Ok(Box::new(EncryptedFile::open(file, fs, desc, key.expose())?)),
            None => Ok(Box::new(PlainFile::new(file, fs, desc))),
        }
    }
}

impl fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorage")
            .field("state", &self.state)
            .field("encrypted", &self.key.is_some())
            .finish()
    }
}
