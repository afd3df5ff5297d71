use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use super::desc::FileDesc;
use crate::crypto::CryptoError;

/// Context for file operations, providing debugging information.
#[derive(Debug, Clone, Default)]
pub struct FileContext {
    /// Storage identity of the file (if known)
    pub desc: Option<FileDesc>,
    /// Path of the file on disk
    pub path: Option<PathBuf>,
    /// Byte offset the failing operation was working at
    pub offset: Option<u64>,
}

impl FileContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_desc(mut self, desc: FileDesc) -> Self {
        self.desc = Some(desc);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl fmt::Display for FileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(desc) = self.desc {
            parts.push(format!("file {}", desc.file_name()));
        }
        if let Some(offset) = self.offset {
            parts.push(format!("offset {offset}"));
        }
        if let Some(ref path) = self.path {
            parts.push(format!("at {:?}", path.display()));
        }

        if parts.is_empty() {
            write!(f, "(no context)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    /// The file's length or footer does not describe a valid encrypted layout.
    ///
    /// **[INTEGRITY VIOLATION]** The file was truncated, extended by another
    /// writer, or was never written by this layer.
    #[error("Corrupt file {context}: {reason}")]
    CorruptFile {
        reason: String,
        context: FileContext,
    },

    /// Cipher construction or block transform failed.
    #[error("Cipher error: {0}")]
    Crypto(#[from] CryptoError),

    /// The file has already been closed.
    #[error("File already closed: {context}")]
    Closed { context: FileContext },

    /// I/O error on the underlying handle.
    #[error("IO error on {context}: {source}")]
    Io {
        #[source]
        source: io::Error,
        context: FileContext,
    },

    /// A write failed after its complete blocks reached the file.
    ///
    /// `written` counts the plaintext bytes that were flushed as ciphertext
    /// blocks before the failure.
    #[error("Write to {context} failed after {written} bytes: {source}")]
    PartialWrite {
        written: usize,
        #[source]
        source: io::Error,
        context: FileContext,
    },

    /// Syncing the storage directory failed.
    #[error("Failed to sync directory {path:?}: {source}")]
    DirectorySync {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

impl From<io::Error> for StorageError {
    fn from(source: io::Error) -> Self {
        StorageError::Io {
            source,
            context: FileContext::new(),
        }
    }
}

impl StorageError {
    /// Create an IO error with context
    #[must_use]
    pub fn io_with_context(source: io::Error, context: FileContext) -> Self {
        StorageError::Io { source, context }
    }

    #[must_use]
    pub fn corrupt(reason: impl Into<String>, context: FileContext) -> Self {
        StorageError::CorruptFile {
            reason: reason.into(),
            context,
        }
    }

    #[must_use]
    pub fn dir_sync(source: io::Error, path: &Path) -> Self {
        StorageError::DirectorySync {
            source,
            path: path.to_path_buf(),
        }
    }

    /// True for [`StorageError::Closed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, StorageError::Closed { .. })
    }

    /// True for [`StorageError::CorruptFile`].
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StorageError::CorruptFile { .. })
    }

    /// True when the cipher rejected the key length.
    pub fn is_invalid_key(&self) -> bool {
        matches!(
            self,
            StorageError::Crypto(CryptoError::InvalidKeyLength { .. })
        )
    }

    /// Bytes accounted as written before the failure.
    pub fn bytes_written(&self) -> usize {
        match self {
            StorageError::PartialWrite { written, .. } => *written,
            _ => 0,
        }
    }
}

impl From<StorageError> for io::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io { source, .. } => source,
            other => io::Error::other(other),
        }
    }
}
