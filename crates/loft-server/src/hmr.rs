//! Hot-update notification.
//!
//! Watches the routed and public directories through the VFS and fans
//! change events out over two channels: an in-process subscriber list and
//! a best-effort `postMessage` port (so sandboxed iframes can receive
//! them). CSS and JS-family changes are hot `update`s; anything else asks
//! the client for a full reload.

use crate::shell::HMR_CHANNEL;
use loft_fs::{path, SharedVfs, WatchEvent, WatcherSet};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const HOT_EXTENSIONS: &[&str] = &["css", "js", "jsx", "ts", "tsx", "mjs"];

/// Kind of update the client should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HmrEventKind {
    /// Hot-swap the changed module or stylesheet
    Update,
    /// State cannot be preserved; reload the page
    FullReload,
}

/// One change notification.
#[derive(Debug, Clone, Serialize)]
pub struct HmrEvent {
    /// Update type
    #[serde(rename = "type")]
    pub kind: HmrEventKind,
    /// Changed virtual path
    pub path: String,
    /// Milliseconds since the epoch
    pub timestamp: u64,
}

/// Delivery target for cross-window fan-out. Implementations wrap
/// `window.postMessage` (or a test sink).
pub trait MessagePort: Send + Sync {
    /// Deliver one serialized event payload. Best-effort: failures are
    /// the port's problem.
    fn post(&self, payload: &str);
}

/// In-process subscriber callback.
pub type HmrSubscriber = Arc<dyn Fn(&HmrEvent) + Send + Sync>;

#[derive(Default)]
struct Fanout {
    subscribers: RwLock<Vec<(u64, HmrSubscriber)>>,
    ports: RwLock<Vec<Arc<dyn MessagePort>>>,
    next_id: RwLock<u64>,
}

impl Fanout {
    fn emit(&self, event: &HmrEvent) {
        for (_, subscriber) in self.subscribers.read().iter() {
            subscriber(event);
        }

        let ports = self.ports.read();
        if !ports.is_empty() {
            let payload = match serde_json::to_value(event) {
                Ok(mut value) => {
                    value["channel"] = serde_json::Value::String(HMR_CHANNEL.to_string());
                    value.to_string()
                }
                Err(_) => return,
            };
            for port in ports.iter() {
                port.post(&payload);
            }
        }
    }
}

/// Watches project trees and broadcasts [`HmrEvent`]s.
pub struct HmrNotifier {
    fanout: Arc<Fanout>,
    watchers: WatcherSet,
}

impl HmrNotifier {
    /// Start watching `dirs` (typically pages, app, and public). Trees
    /// that cannot be watched are logged and skipped; HMR continues on
    /// the rest.
    pub fn start(vfs: &SharedVfs, dirs: &[&str]) -> Self {
        let fanout = Arc::new(Fanout::default());
        let mut watchers = WatcherSet::new();

        for dir in dirs {
            let sink = Arc::clone(&fanout);
            let result = vfs.watch(
                dir,
                true,
                Arc::new(move |change: &WatchEvent| {
                    sink.emit(&classify(&change.path));
                }),
            );
            match result {
                Ok(guard) => watchers.push(guard),
                Err(err) => {
                    tracing::warn!(dir = %dir, %err, "cannot watch directory, continuing without HMR there");
                }
            }
        }

        Self { fanout, watchers }
    }

    /// Subscribe to events in-process. Returns an id for [`Self::unsubscribe`].
    pub fn subscribe(&self, subscriber: HmrSubscriber) -> u64 {
        let id = {
            let mut next = self.fanout.next_id.write();
            let id = *next;
            *next += 1;
            id
        };
        self.fanout.subscribers.write().push((id, subscriber));
        id
    }

    /// Drop an in-process subscription.
    pub fn unsubscribe(&self, id: u64) {
        self.fanout.subscribers.write().retain(|(sid, _)| *sid != id);
    }

    /// Register a postMessage target window.
    pub fn register_port(&self, port: Arc<dyn MessagePort>) {
        self.fanout.ports.write().push(port);
    }

    /// Number of live watch subscriptions.
    pub fn watched_trees(&self) -> usize {
        self.watchers.len()
    }

    /// Stop watching entirely.
    pub fn close(&mut self) {
        self.watchers.close_all();
    }
}

fn classify(changed: &str) -> HmrEvent {
    let ext = path::extension(changed).unwrap_or("");
    let kind = if HOT_EXTENSIONS.contains(&ext) {
        HmrEventKind::Update
    } else {
        HmrEventKind::FullReload
    };
    HmrEvent {
        kind,
        path: changed.to_string(),
        timestamp: now_millis(),
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
