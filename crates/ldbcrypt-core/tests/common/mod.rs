//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::{
    io::{self, Read, Seek, SeekFrom},
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use ldbcrypt_core::storage::{DirectorySyncer, FileStorage, LogSink, StorageOptions};
use parking_lot::Mutex;

pub mod mem_file;

pub use mem_file::{MemFile, MemFileControl};

pub const TEST_KEY: [u8; 16] = *b"ldbcrypt-testkey";
pub const TEST_KEY_256: [u8; 32] = [0x42; 32];

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Log sink that keeps every message.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl LogSink for RecordingSink {
    fn log(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Directory syncer that counts calls and can be told to fail.
#[derive(Default)]
pub struct CountingSyncer {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingSyncer {
    pub fn failing() -> Self {
        let syncer = Self::default();
        syncer.fail.store(true, Ordering::SeqCst);
        syncer
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DirectorySyncer for CountingSyncer {
    fn sync_dir(&self, _path: &Path) -> io::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(io::Error::other("injected directory sync failure"))
        } else {
            Ok(())
        }
    }
}

/// Storage wired to a recording sink and counting syncer.
pub struct TestStorage {
    pub storage: FileStorage,
    pub sink: Arc<RecordingSink>,
    pub syncer: Arc<CountingSyncer>,
}

pub fn test_storage(root: &Path, key: Option<&[u8]>) -> TestStorage {
    test_storage_with_syncer(root, key, CountingSyncer::default())
}

pub fn test_storage_with_syncer(
    root: &Path,
    key: Option<&[u8]>,
    syncer: CountingSyncer,
) -> TestStorage {
    init_tracing();
    let sink = Arc::new(RecordingSink::default());
    let syncer = Arc::new(syncer);

    let mut options = StorageOptions::new()
        .with_log_sink(sink.clone())
        .with_directory_syncer(syncer.clone());
    if let Some(key) = key {
        options = options.with_key(key).unwrap();
    }

    TestStorage {
        storage: FileStorage::new(root, options).unwrap(),
        sink,
        syncer,
    }
}

/// Length of the file at `path`.
pub fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

/// Read a raw file completely from the start.
pub fn read_all<F: Read + Seek>(file: &mut F) -> Vec<u8> {
    let mut out = Vec::new();
    file.seek(SeekFrom::Start(0)).unwrap();
    file.read_to_end(&mut out).unwrap();
    out
}

/// Assert a raw encrypted length keeps the seed/blocks/footer alignment.
pub fn assert_aligned(len: u64) {
    assert!(len >= 24, "encrypted file shorter than seed + footer: {len}");
    assert_eq!((len - 8) % 16, 0, "length {len} minus footer is not block aligned");
}

/// Write helper used by tests that go through `io::Write`-style loops.
pub fn write_chunks(file: &mut dyn ldbcrypt_core::StorageFile, chunks: &[&[u8]]) {
    for chunk in chunks {
        assert_eq!(file.write(chunk).unwrap(), chunk.len());
    }
}
