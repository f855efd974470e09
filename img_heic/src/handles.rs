//! Revocable handles to result buffers.
//!
//! A handle keeps its buffer resolvable until it is released, either
//! explicitly or by dropping the [`ResultHandle`].

use crate::outcome::Success;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    mime_type: &'static str,
    bytes: Arc<[u8]>,
}

#[derive(Debug, Default)]
struct Registry {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, Entry>>,
}

impl Registry {
    fn live(&self) -> MutexGuard<'_, HashMap<u64, Entry>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    inner: Arc<Registry>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, success: &Success) -> ResultHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Entry {
            name: success.output_name.clone(),
            mime_type: success.mime_type(),
            bytes: Arc::clone(&success.bytes),
        };
        self.inner.live().insert(id, entry);
        debug!(id, name = %success.output_name, "handle issued");
        ResultHandle {
            id,
            name: success.output_name.clone(),
            mime_type: success.mime_type(),
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Bytes behind `id`, or `None` once it has been released.
    pub fn resolve(&self, id: u64) -> Option<Arc<[u8]>> {
        self.inner.live().get(&id).map(|e| Arc::clone(&e.bytes))
    }

    /// Returns whether `id` was live.
    pub fn release(&self, id: u64) -> bool {
        self.inner.live().remove(&id).is_some()
    }

    pub fn release_all(&self) -> usize {
        let mut live = self.inner.live();
        let n = live.len();
        live.clear();
        n
    }

    pub fn live(&self) -> usize {
        self.inner.live().len()
    }

    /// Names of live handles, sorted.
    pub fn live_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.live().values().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }
}

/// A live reference to one result buffer; released on drop.
#[derive(Debug)]
pub struct ResultHandle {
    id: u64,
    name: String,
    mime_type: &'static str,
    registry: Weak<Registry>,
}

impl ResultHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn uri(&self) -> String {
        format!("blob:img-heic/{}", self.id)
    }

    /// `None` if released or if the registry is gone.
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        let registry = self.registry.upgrade()?;
        let bytes = registry.live().get(&self.id).map(|e| Arc::clone(&e.bytes));
        bytes
    }

    pub fn is_live(&self) -> bool {
        self.bytes().is_some()
    }
}

impl Drop for ResultHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.live().remove(&self.id).is_some() {
                debug!(id = self.id, "handle released on drop");
            }
        }
    }
}
