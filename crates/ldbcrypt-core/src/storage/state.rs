//! Bookkeeping shared by every open file of one storage root.
//!
//! A [`FileSystemState`] is created once per storage directory and handed to
//! every file wrapper through an `Arc`. The wrappers only take its lock for
//! the open-count update in `open`/`close`; I/O never happens under it.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Destination for storage-level diagnostic messages.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Default sink: forwards messages to `tracing` at warn level.
#[derive(Debug, Clone)]
pub struct TracingLogSink {
    path: PathBuf,
}

impl TracingLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, message: &str) {
        warn!(storage = %self.path.display(), "{message}");
    }
}

/// Makes directory metadata (new entries, renames) durable.
pub trait DirectorySyncer: Send + Sync {
    fn sync_dir(&self, path: &Path) -> io::Result<()>;
}

/// Syncs directories through the host file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectorySyncer;

impl DirectorySyncer for FsDirectorySyncer {
    #[cfg(unix)]
    fn sync_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::File::open(path)?.sync_all()
    }

    // Directories cannot be opened for syncing through std on other platforms.
    #[cfg(not(unix))]
    fn sync_dir(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Bookkeeping {
    open: i64,
}

/// State shared by all files of one storage root.
pub struct FileSystemState {
    path: PathBuf,
    inner: Mutex<Bookkeeping>,
    log_sink: Arc<dyn LogSink>,
    dir_syncer: Arc<dyn DirectorySyncer>,
}

impl FileSystemState {
    /// State for `path` using the tracing sink and the host directory syncer.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let log_sink = Arc::new(TracingLogSink::new(path.clone()));
        Self::with_parts(path, log_sink, Arc::new(FsDirectorySyncer))
    }

    pub fn with_parts(
        path: impl Into<PathBuf>,
        log_sink: Arc<dyn LogSink>,
        dir_syncer: Arc<dyn DirectorySyncer>,
    ) -> Self {
        Self {
            path: path.into(),
            inner: Mutex::new(Bookkeeping::default()),
            log_sink,
            dir_syncer,
        }
    }

    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Base path of the storage root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of files opened and not yet closed.
    pub fn open_count(&self) -> i64 {
        self.inner.lock().open
    }

    pub fn log(&self, message: &str) {
        self.log_sink.log(message);
    }

    /// Sync the storage directory itself.
    pub fn sync_dir(&self) -> io::Result<()> {
        self.dir_syncer.sync_dir(&self.path)
    }

    pub(crate) fn register_open(&self) {
        let mut inner = self.inner.lock();
        inner.open += 1;
        debug!(open = inner.open, "Storage file opened");
    }

    /// Run `f` with the bookkeeping lock held, decrementing the open count
    /// when `f` reports that it released a file.
    pub(crate) fn release_with<T>(&self, f: impl FnOnce() -> Option<T>) -> Option<T> {
        let mut inner = self.inner.lock();
        let released = f();
        if released.is_some() {
            inner.open -= 1;
        }
        released
    }
}

impl fmt::Debug for FileSystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemState")
            .field("path", &self.path)
            .field("open", &self.open_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    impl LogSink for RecordingSink {
        fn log(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    #[derive(Default)]
    struct CountingSyncer(AtomicUsize);

    impl DirectorySyncer for CountingSyncer {
        fn sync_dir(&self, _path: &Path) -> io::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_open_release_bookkeeping() {
        let state = FileSystemState::new("/tmp/db");
        assert_eq!(state.open_count(), 0);

        state.register_open();
        state.register_open();
        assert_eq!(state.open_count(), 2);

        assert_eq!(state.release_with(|| Some(())), Some(()));
        assert_eq!(state.open_count(), 1);

        // Nothing released, nothing decremented
        assert_eq!(state.release_with(|| None::<()>), None);
        assert_eq!(state.open_count(), 1);
    }

    #[test]
    fn test_log_and_sync_go_through_parts() {
        let sink = Arc::new(RecordingSink::default());
        let syncer = Arc::new(CountingSyncer::default());
        let state = FileSystemState::with_parts("/db", sink.clone(), syncer.clone());

        state.log("hello");
        state.sync_dir().unwrap();
        state.sync_dir().unwrap();

        assert_eq!(*sink.0.lock(), vec!["hello".to_string()]);
        assert_eq!(syncer.0.load(Ordering::SeqCst), 2);
        assert_eq!(state.path(), Path::new("/db"));
    }

    #[test]
    fn test_fs_directory_syncer_on_real_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        FsDirectorySyncer.sync_dir(dir.path()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_fs_directory_syncer_missing_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(FsDirectorySyncer.sync_dir(&missing).is_err());
    }
}
