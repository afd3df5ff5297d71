//! The file capability shared by plain and encrypted wrappers.
//!
//! The storage engine only ever sees a `Box<dyn StorageFile>`. Both wrapper
//! kinds compose a [`TrackedHandle`], which owns the raw handle and does the
//! open-count bookkeeping and durability work they have in common.

use std::{
    fmt,
    fs::File,
    io::{self, Read, Seek, Write},
    sync::Arc,
};

use tracing::{debug, warn};

use super::desc::FileDesc;
use super::error::{FileContext, StorageError};
use crate::storage::state::FileSystemState;

/// Operations the storage engine performs on an open file.
///
/// Reads and seeks go straight to the underlying handle. After `close` every
/// operation fails: `write`, `sync` and `close` with
/// [`StorageError::Closed`], `read` and `seek` with an `io::Error` wrapping it.
pub trait StorageFile: Read + Seek + Send + fmt::Debug {
    /// Identity of this file.
    fn desc(&self) -> FileDesc;

    /// Append `data`, returning the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, StorageError>;

    /// Make everything written so far durable.
    fn sync(&mut self) -> Result<(), StorageError>;

    /// Close the file. Only the first call can succeed.
    fn close(&mut self) -> Result<(), StorageError>;
}

/// A raw random-access file handle.
///
/// Implemented for [`std::fs::File`]; tests substitute in-memory handles to
/// inject failures.
pub trait RawFile: Read + Write + Seek + Send {
    fn sync_all(&self) -> io::Result<()>;

    fn set_len(&self, len: u64) -> io::Result<()>;

    /// Close the handle, reporting errors that a plain drop would swallow.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

impl RawFile for File {
    fn sync_all(&self) -> io::Result<()> {
        File::sync_all(self)
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    #[cfg(unix)]
    fn close(self) -> io::Result<()> {
        use std::os::fd::IntoRawFd;

        let fd = self.into_raw_fd();
        // SAFETY: `into_raw_fd` transferred ownership of `fd` to us and it is
        // closed exactly once here.
        if unsafe { libc::close(fd) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn close(self) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}

/// Raw handle plus the bookkeeping every wrapper needs.
///
/// Registers itself in the shared [`FileSystemState`] on creation and
/// unregisters exactly once, on `close` or on drop.
pub(crate) struct TrackedHandle<F> {
    file: Option<F>,
    fs: Arc<FileSystemState>,
    desc: FileDesc,
}

impl<F: RawFile> TrackedHandle<F> {
    pub(crate) fn new(file: F, fs: Arc<FileSystemState>, desc: FileDesc) -> Self {
        fs.register_open();
        Self {
            file: Some(file),
            fs,
            desc,
        }
    }

    pub(crate) fn desc(&self) -> FileDesc {
        self.desc
    }

    pub(crate) fn context(&self) -> FileContext {
        FileContext::new()
            .with_desc(self.desc)
            .with_path(self.fs.path().join(self.desc.file_name()))
    }

    /// The raw handle, or `Closed`.
    pub(crate) fn file_mut(&mut self) -> Result<&mut F, StorageError> {
        match self.file {
            Some(ref mut file) => Ok(file),
            None => Err(StorageError::Closed {
                context: FileContext::new().with_desc(self.desc),
            }),
        }
    }

    /// The raw handle for `io::Read`/`io::Seek` forwarding.
    pub(crate) fn io_file(&mut self) -> io::Result<&mut F> {
        self.file_mut().map_err(io::Error::from)
    }

    /// fsync the handle, then the storage directory for manifests.
    pub(crate) fn sync_durable(&mut self) -> Result<(), StorageError> {
        let context = self.context();
        self.file_mut()?
            .sync_all()
            .map_err(|e| StorageError::io_with_context(e, context))?;

        if self.desc.kind.needs_dir_sync() {
            // A manifest switch is only durable once the directory entry is.
            if let Err(err) = self.fs.sync_dir() {
                self.fs.log(&format!("syncDir: {err}"));
                warn!(file = %self.desc, error = %err, "Directory sync failed");
                return Err(StorageError::dir_sync(err, self.fs.path()));
            }
            debug!(file = %self.desc, "Storage directory synced");
        }
        Ok(())
    }

    pub(crate) fn close(&mut self) -> Result<(), StorageError> {
        let desc = self.desc;
        let file = self
            .fs
            .release_with(|| self.file.take())
            .ok_or_else(|| StorageError::Closed {
                context: FileContext::new().with_desc(desc),
            })?;

        if let Err(err) = file.close() {
            self.fs.log(&format!("close {desc}: {err}"));
            return Err(StorageError::io_with_context(err, self.context()));
        }
        debug!(file = %desc, "Storage file closed");
        Ok(())
    }
}

impl<F> Drop for TrackedHandle<F> {
    fn drop(&mut self) {
        if self.fs.release_with(|| self.file.take()).is_some() {
            debug!(file = %self.desc, "Storage file dropped without close");
        }
    }
}

impl<F> fmt::Debug for TrackedHandle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedHandle")
            .field("desc", &self.desc)
            .field("closed", &self.file.is_none())
            .finish_non_exhaustive()
    }
}
