//! Compiled-view cache
//!
//! Artifacts are cached per virtual path and keyed by the file identity the
//! loader reported. Each identity gets one cell; concurrent requests for
//! the same identity share the cell, so the expensive compile runs at most
//! once and only a successful compile is ever installed. A changed
//! modification time replaces the cell, dropping the stale artifact.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::trace;

struct Entry<T> {
    modified: Option<SystemTime>,
    slot: Arc<OnceCell<Arc<T>>>,
}

/// Identity-keyed artifact cache
pub struct ViewCache<T> {
    entries: RwLock<HashMap<String, Entry<T>>>,
}

impl<T> Default for ViewCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> ViewCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cell for this path at this identity. Callers populate it with
    /// `get_or_try_init`; a failed populate leaves the cell empty so a
    /// later request retries.
    pub fn slot(&self, path: &str, modified: Option<SystemTime>) -> Arc<OnceCell<Arc<T>>> {
        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(path) {
                if entry.modified == modified {
                    return entry.slot.clone();
                }
            }
        }
        let mut entries = self.entries.write();
        let entry = entries.entry(path.to_string()).or_insert_with(|| Entry {
            modified,
            slot: Arc::new(OnceCell::new()),
        });
        if entry.modified != modified {
            trace!(path, "markup file changed, dropping cached view");
            entry.modified = modified;
            entry.slot = Arc::new(OnceCell::new());
        }
        entry.slot.clone()
    }

    /// Drop every cached artifact
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
