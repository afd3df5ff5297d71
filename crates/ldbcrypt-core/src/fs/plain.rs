//! Unencrypted storage file.

use std::{
    fmt,
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
    sync::Arc,
};

use tracing::trace;

use super::desc::FileDesc;
use super::error::StorageError;
use super::handle::{RawFile, StorageFile, TrackedHandle};
use crate::storage::state::FileSystemState;

/// Storage file written as-is.
///
/// Adds only the open-file bookkeeping and the manifest directory sync on top
/// of the raw handle.
pub struct PlainFile<F: RawFile = File> {
    handle: TrackedHandle<F>,
}

impl<F: RawFile> PlainFile<F> {
    pub fn new(file: F, fs: Arc<FileSystemState>, desc: FileDesc) -> Self {
        Self {
            handle: TrackedHandle::new(file, fs, desc),
        }
    }
}

impl<F: RawFile> Read for PlainFile<F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle.io_file()?.read(buf)
    }
}

impl<F: RawFile> Seek for PlainFile<F> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.handle.io_file()?.seek(pos)
    }
}

impl<F: RawFile> StorageFile for PlainFile<F> {
    fn desc(&self) -> FileDesc {
        self.handle.desc()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        let context = self.handle.context();
        self.handle
            .file_mut()?
            .write_all(data)
            .map_err(|e| StorageError::io_with_context(e, context))?;
        trace!(file = %self.handle.desc(), len = data.len(), "Plain write");
        Ok(data.len())
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.handle.sync_durable()
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.handle.close()
    }
}

impl<F: RawFile> fmt::Debug for PlainFile<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainFile")
            .field("handle", &self.handle)
            .finish()
    }
}
