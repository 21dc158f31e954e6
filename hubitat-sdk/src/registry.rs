//! Listener registration and event fanout
//!
//! This module maps device ids, plus the two hub-wide keys for mode and HSM
//! changes, to ordered lists of listener callbacks. Dispatch works on a
//! snapshot of the list, so listeners may subscribe or unsubscribe from
//! inside a callback without affecting the pass in progress.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::device::DeviceId;
use crate::event::Event;

/// A callback invoked for every event under the key it was registered with
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Key a listener is registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListenerKey {
    /// Attribute changes of one device
    Device(DeviceId),
    /// Hub mode changes
    Mode,
    /// HSM status changes
    Hsm,
}

impl ListenerKey {
    pub fn as_str(&self) -> &str {
        match self {
            ListenerKey::Device(id) => id.as_str(),
            ListenerKey::Mode => "mode",
            ListenerKey::Hsm => "hsm",
        }
    }
}

impl fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DeviceId> for ListenerKey {
    fn from(id: DeviceId) -> Self {
        ListenerKey::Device(id)
    }
}

/// Thread-safe registry of listeners
///
/// Registering the same callback twice under the same key delivers every
/// event to it twice.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<ListenerKey, Vec<Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener to the list for `key`.
    pub fn subscribe<F>(&self, key: ListenerKey, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe_arc(key, Arc::new(listener));
    }

    pub fn subscribe_arc(&self, key: ListenerKey, listener: Listener) {
        tracing::debug!("Adding listener for {}", key);
        self.listeners.write().entry(key).or_default().push(listener);
    }

    /// Remove every listener for `key`, returning how many were removed.
    ///
    /// A dispatch already in progress for `key` still completes with the
    /// listeners it started with.
    pub fn unsubscribe_all(&self, key: &ListenerKey) -> usize {
        let removed = self
            .listeners
            .write()
            .remove(key)
            .map_or(0, |listeners| listeners.len());
        tracing::debug!("Removed {} listeners for {}", removed, key);
        removed
    }

    /// Remove every listener for every key.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    pub fn listener_count(&self, key: &ListenerKey) -> usize {
        self.listeners.read().get(key).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().values().all(Vec::is_empty)
    }

    /// Listeners currently registered for `key`, in registration order.
    pub fn snapshot(&self, key: &ListenerKey) -> Vec<Listener> {
        self.listeners.read().get(key).cloned().unwrap_or_default()
    }

    /// Invoke every listener for `key` with `event`, in registration order.
    ///
    /// A listener that panics is logged and skipped; the remaining listeners
    /// still run. Returns the number of listeners that completed normally.
    pub fn dispatch(&self, key: &ListenerKey, event: &Event) -> usize {
        let listeners = self.snapshot(key);
        let mut delivered = 0;

        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!("Listener for {} panicked: {}", key, message);
                }
            }
        }

        delivered
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<String, usize> = self
            .listeners
            .read()
            .iter()
            .map(|(key, listeners)| (key.to_string(), listeners.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}
