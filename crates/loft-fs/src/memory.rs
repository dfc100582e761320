//! In-memory virtual filesystem.
//!
//! Backs the engine's tests and browser embedders. Directories are
//! implicit: a directory exists iff some stored file path has it as a
//! proper prefix. Mutations fan out [`WatchEvent`]s to matching
//! subscriptions synchronously, in registration order.

use crate::path;
use crate::watch::{WatchCallback, WatchEvent, WatchEventKind, WatchGuard};
use crate::{FsError, FsResult, Vfs};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

struct Subscription {
    root: String,
    recursive: bool,
    callback: WatchCallback,
}

#[derive(Default)]
struct Inner {
    files: FxHashMap<String, Vec<u8>>,
    watchers: FxHashMap<u64, Subscription>,
    next_watcher_id: u64,
}

/// In-memory [`Vfs`] implementation.
#[derive(Default)]
pub struct MemoryFs {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryFs {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filesystem pre-populated from `(path, content)` pairs.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        let fs = Self::new();
        for (p, c) in files {
            fs.insert(p.as_ref(), c);
        }
        fs
    }

    /// Insert a file without notifying watchers. Used for fixture setup.
    pub fn insert(&self, p: &str, content: impl Into<Vec<u8>>) {
        let norm = path::normalize(p);
        self.inner.write().files.insert(norm, content.into());
    }

    /// Write a file, notifying watchers with `Created` or `Modified`.
    pub fn write(&self, p: &str, content: impl Into<Vec<u8>>) {
        let norm = path::normalize(p);
        let kind = {
            let mut inner = self.inner.write();
            let kind = if inner.files.contains_key(&norm) {
                WatchEventKind::Modified
            } else {
                WatchEventKind::Created
            };
            inner.files.insert(norm.clone(), content.into());
            kind
        };
        self.notify(&WatchEvent { kind, path: norm });
    }

    /// Remove a file, notifying watchers. Missing paths are a no-op.
    pub fn remove(&self, p: &str) {
        let norm = path::normalize(p);
        let removed = self.inner.write().files.remove(&norm).is_some();
        if removed {
            self.notify(&WatchEvent {
                kind: WatchEventKind::Removed,
                path: norm,
            });
        }
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.inner.read().files.len()
    }

    /// Whether the filesystem holds no files.
    pub fn is_empty(&self) -> bool {
        self.inner.read().files.is_empty()
    }

    fn notify(&self, event: &WatchEvent) {
        // Clone the callbacks out so watcher code can re-enter the fs.
        let matching: Vec<WatchCallback> = {
            let inner = self.inner.read();
            inner
                .watchers
                .values()
                .filter(|sub| sub.matches(&event.path))
                .map(|sub| Arc::clone(&sub.callback))
                .collect()
        };
        for cb in matching {
            cb(event);
        }
    }
}

impl Subscription {
    fn matches(&self, changed: &str) -> bool {
        if self.recursive {
            path::starts_with_dir(changed, &self.root)
        } else {
            path::parent(changed) == self.root
        }
    }
}

impl Vfs for MemoryFs {
    fn exists(&self, p: &str) -> bool {
        let norm = path::normalize(p);
        let inner = self.inner.read();
        inner.files.contains_key(&norm) || dir_exists(&inner.files, &norm)
    }

    fn is_dir(&self, p: &str) -> bool {
        let norm = path::normalize(p);
        let inner = self.inner.read();
        !inner.files.contains_key(&norm) && dir_exists(&inner.files, &norm)
    }

    fn read_dir(&self, p: &str) -> FsResult<Vec<String>> {
        let norm = path::normalize(p);
        let inner = self.inner.read();
        if !dir_exists(&inner.files, &norm) {
            return Err(FsError::NotFound(norm));
        }
        let prefix = if norm == "/" { String::new() } else { norm.clone() };
        let mut names: Vec<String> = inner
            .files
            .keys()
            .filter_map(|file| {
                let rest = file.strip_prefix(&prefix)?.strip_prefix('/')?;
                Some(rest.split('/').next().unwrap_or(rest).to_string())
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn read(&self, p: &str) -> FsResult<Vec<u8>> {
        let norm = path::normalize(p);
        let inner = self.inner.read();
        match inner.files.get(&norm) {
            Some(bytes) => Ok(bytes.clone()),
            None if dir_exists(&inner.files, &norm) => Err(FsError::NotAFile(norm)),
            None => Err(FsError::NotFound(norm)),
        }
    }

    fn watch(&self, p: &str, recursive: bool, cb: WatchCallback) -> FsResult<WatchGuard> {
        let norm = path::normalize(p);
        let id = {
            let mut inner = self.inner.write();
            let id = inner.next_watcher_id;
            inner.next_watcher_id += 1;
            inner.watchers.insert(
                id,
                Subscription {
                    root: norm,
                    recursive,
                    callback: cb,
                },
            );
            id
        };
        let inner = Arc::clone(&self.inner);
        Ok(WatchGuard::new(move || {
            inner.write().watchers.remove(&id);
        }))
    }
}

fn dir_exists(files: &FxHashMap<String, Vec<u8>>, dir: &str) -> bool {
    if dir == "/" {
        return true;
    }
    files.keys().any(|file| path::starts_with_dir(file, dir) && file != dir)
}
