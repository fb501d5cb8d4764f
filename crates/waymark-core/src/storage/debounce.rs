//! Debounced write-coalescing persister
//!
//! Repeated mutations within the debounce window coalesce into a single
//! write per key; the most recently scheduled payload is what lands
//! (last-write-wins, no merging of in-flight writes). All write failures are
//! swallowed and logged - persistence degrades to session-only, it never
//! fails a mutation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::backend::StorageBackend;

/// Default coalescing window, matching the store's write-churn profile.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(350);

struct PendingWrite {
    payload: String,
    task: Option<JoinHandle<()>>,
}

/// Per-key debounced writer over a shared backend.
///
/// Each key holds at most one pending timer; scheduling again cancels and
/// replaces it. Outside a tokio runtime the persister degrades to immediate
/// synchronous writes, which preserves last-write-wins ordering.
pub struct Persister {
    backend: Arc<dyn StorageBackend>,
    delay: Duration,
    pending: Arc<Mutex<HashMap<String, PendingWrite>>>,
    runtime: Option<Handle>,
}

impl Persister {
    pub fn new(backend: Arc<dyn StorageBackend>, delay: Duration) -> Self {
        Persister {
            backend,
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Schedule a debounced write of `payload` under `key`, cancelling any
    /// pending write for the same key.
    pub fn schedule(&self, key: &str, payload: String) {
        let Some(runtime) = &self.runtime else {
            // No runtime: write through immediately.
            write_swallowing(self.backend.as_ref(), key, &payload);
            return;
        };

        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if let Some(previous) = pending.remove(key) {
            if let Some(task) = previous.task {
                task.abort();
            }
        }

        let backend = Arc::clone(&self.backend);
        let map = Arc::clone(&self.pending);
        let delay = self.delay;
        let task_key = key.to_string();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let entry = match map.lock() {
                Ok(mut guard) => guard.remove(&task_key),
                Err(_) => None,
            };
            if let Some(write) = entry {
                write_swallowing(backend.as_ref(), &task_key, &write.payload);
            }
        });
        pending.insert(
            key.to_string(),
            PendingWrite {
                payload,
                task: Some(task),
            },
        );
    }

    /// Write immediately, cancelling any pending debounced write for the key.
    /// Used for keys the store persists eagerly (selection, retention config,
    /// archives, post-migration upgrades).
    pub fn write_now(&self, key: &str, payload: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.remove(key) {
                if let Some(task) = previous.task {
                    task.abort();
                }
            }
        }
        write_swallowing(self.backend.as_ref(), key, payload);
    }

    /// Flush all pending writes immediately (shutdown/tests).
    pub fn flush(&self) {
        let drained: Vec<(String, PendingWrite)> = match self.pending.lock() {
            Ok(mut guard) => guard.drain().collect(),
            Err(_) => return,
        };
        for (key, write) in drained {
            if let Some(task) = write.task {
                task.abort();
            }
            write_swallowing(self.backend.as_ref(), &key, &write.payload);
        }
    }

    /// True when a write for `key` is still waiting on its timer.
    pub fn has_pending(&self, key: &str) -> bool {
        self.pending
            .lock()
            .map(|guard| guard.contains_key(key))
            .unwrap_or(false)
    }
}

fn write_swallowing(backend: &dyn StorageBackend, key: &str, payload: &str) {
    if let Err(err) = backend.set(key, payload) {
        tracing::warn!("Persistence write for {} failed: {}", key, err);
    }
}
