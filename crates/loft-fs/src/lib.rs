//! Virtual-filesystem interface for the loft dev server.
//!
//! The engine never touches a real disk: all project files live behind the
//! [`Vfs`] trait, keyed by absolute `/`-rooted string paths. This crate
//! defines that interface, watch subscriptions, and an in-memory
//! implementation ([`MemoryFs`]) used by tests and browser embedders.

pub mod memory;
pub mod path;
pub mod watch;

pub use memory::MemoryFs;
pub use watch::{WatchCallback, WatchEvent, WatchEventKind, WatchGuard, WatcherSet};

use std::sync::Arc;
use thiserror::Error;

/// Filesystem errors surfaced through the [`Vfs`] interface.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path does not exist
    #[error("No such file: {0}")]
    NotFound(String),

    /// Path exists but is a directory where a file was expected (or vice versa)
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// File content is not valid UTF-8
    #[error("File is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// The backing store could not register a watch
    #[error("Watch failed on {path}: {reason}")]
    WatchFailed {
        /// Directory that could not be watched
        path: String,
        /// Backend-specific reason
        reason: String,
    },
}

/// Result type alias for filesystem operations.
pub type FsResult<T, E = FsError> = std::result::Result<T, E>;

/// The filesystem surface consumed by the dev server.
///
/// Paths are absolute, `/`-rooted strings (see [`path`]). Implementations
/// must be cheap to query: the dispatcher probes `exists` heavily during
/// route resolution.
pub trait Vfs: Send + Sync {
    /// Whether a file or directory exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Whether `path` names a directory.
    fn is_dir(&self, path: &str) -> bool;

    /// Child names (not full paths) of the directory at `path`.
    fn read_dir(&self, path: &str) -> FsResult<Vec<String>>;

    /// Raw bytes of the file at `path`.
    fn read(&self, path: &str) -> FsResult<Vec<u8>>;

    /// UTF-8 content of the file at `path`.
    fn read_to_string(&self, path: &str) -> FsResult<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|_| FsError::InvalidUtf8(path.to_string()))
    }

    /// Subscribe to change events under `path`. With `recursive`, events
    /// from the whole subtree are delivered; otherwise only direct
    /// children. The subscription lives until the returned guard is
    /// dropped or closed.
    fn watch(&self, path: &str, recursive: bool, cb: WatchCallback) -> FsResult<WatchGuard>;
}

/// Shared handle to a virtual filesystem.
pub type SharedVfs = Arc<dyn Vfs>;
