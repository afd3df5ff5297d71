//! In-memory raw file with injectable failures.

use std::{
    io::{self, Read, Seek, SeekFrom, Write},
    sync::Arc,
};

use ldbcrypt_core::fs::RawFile;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Inner {
    data: Vec<u8>,
    fail_writes: bool,
    fail_set_len: bool,
    fail_sync: bool,
    fail_close: bool,
    syncs: usize,
    closed: bool,
}

/// A `RawFile` backed by a shared byte vector.
///
/// The paired [`MemFileControl`] stays with the test after the file has been
/// moved into a wrapper.
#[derive(Debug)]
pub struct MemFile {
    inner: Arc<Mutex<Inner>>,
    pos: u64,
}

/// Test-side view of a [`MemFile`].
#[derive(Debug, Clone)]
pub struct MemFileControl {
    inner: Arc<Mutex<Inner>>,
}

impl MemFile {
    pub fn new() -> (Self, MemFileControl) {
        Self::with_data(Vec::new())
    }

    pub fn with_data(data: Vec<u8>) -> (Self, MemFileControl) {
        let inner = Arc::new(Mutex::new(Inner {
            data,
            ..Inner::default()
        }));
        let control = MemFileControl {
            inner: inner.clone(),
        };
        (Self { inner, pos: 0 }, control)
    }
}

impl MemFileControl {
    pub fn data(&self) -> Vec<u8> {
        self.inner.lock().data.clone()
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().data.len() as u64
    }

    pub fn syncs(&self) -> usize {
        self.inner.lock().syncs
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    pub fn fail_set_len(&self, fail: bool) {
        self.inner.lock().fail_set_len = fail;
    }

    pub fn fail_sync(&self, fail: bool) {
        self.inner.lock().fail_sync = fail;
    }

    pub fn fail_close(&self, fail: bool) {
        self.inner.lock().fail_close = fail;
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::other(format!("injected {what} failure"))
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let inner = self.inner.lock();
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX);
        if start >= inner.data.len() {
            return Ok(0);
        }
        let n = buf.len().min(inner.data.len() - start);
        buf[..n].copy_from_slice(&inner.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(injected("write"));
        }
        let start = self.pos as usize;
        let end = start + buf.len();
        if inner.data.len() < end {
            inner.data.resize(end, 0);
        }
        inner.data[start..end].copy_from_slice(buf);
        self.pos = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.inner.lock().data.len() as i64;
        let next = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(d) => len + d,
            SeekFrom::Current(d) => self.pos as i64 + d,
        };
        if next < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "negative seek"));
        }
        self.pos = next as u64;
        Ok(self.pos)
    }
}

impl RawFile for MemFile {
    fn sync_all(&self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_sync {
            return Err(injected("sync"));
        }
        inner.syncs += 1;
        Ok(())
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_set_len {
            return Err(injected("truncate"));
        }
        inner.data.resize(len as usize, 0);
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        if inner.fail_close {
            Err(injected("close"))
        } else {
            Ok(())
        }
    }
}
