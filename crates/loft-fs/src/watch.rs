//! Watch subscriptions over a virtual filesystem.
//!
//! Watches are plain callback subscriptions: the backing store invokes the
//! callback synchronously for every matching mutation. Composition is a
//! list of guards behind a single [`WatcherSet::close_all`].

use std::sync::Arc;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// File was created
    Created,
    /// File content changed
    Modified,
    /// File was removed
    Removed,
}

/// A single change event delivered to a watch callback.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// What happened
    pub kind: WatchEventKind,
    /// Absolute virtual path of the affected file
    pub path: String,
}

/// Callback invoked for every matching change event.
pub type WatchCallback = Arc<dyn Fn(&WatchEvent) + Send + Sync>;

/// Handle keeping a watch subscription alive.
///
/// Dropping the guard (or calling [`WatchGuard::close`]) unsubscribes.
pub struct WatchGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchGuard {
    /// Build a guard from an unsubscribe closure.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Explicitly end the subscription.
    pub fn close(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchGuard")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A set of watch guards closed together.
#[derive(Debug, Default)]
pub struct WatcherSet {
    guards: Vec<WatchGuard>,
}

impl WatcherSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a guard to the set.
    pub fn push(&mut self, guard: WatchGuard) {
        self.guards.push(guard);
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Whether the set holds no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Close every subscription in the set.
    pub fn close_all(&mut self) {
        for guard in self.guards.drain(..) {
            guard.close();
        }
    }
}
