//! Ephemeral page handles.
//!
//! An [`ObjectUrl`] is a runtime-local reference to page bytes, the way a
//! browser object URL references a blob. Handles are minted fresh on every
//! cache read and stop resolving once revoked. The type is not serializable:
//! a handle must never outlive the process that minted it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;

/// URL scheme prefix shared by every handle.
pub const HANDLE_SCHEME: &str = "blob:";

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Session-scoped reference to page bytes held by an [`ObjectUrlRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a URL string names a local handle rather than a remote resource.
pub fn is_handle_url(url: &str) -> bool {
    url.starts_with(HANDLE_SCHEME)
}

/// Registry of live handles.
#[derive(Debug)]
pub struct ObjectUrlRegistry {
    instance: u64,
    next: AtomicU64,
    live: Mutex<HashMap<String, Bytes>>,
}

impl Default for ObjectUrlRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            next: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Mint a new handle for `bytes`. Every call returns a distinct handle.
    pub fn create(&self, bytes: Bytes) -> ObjectUrl {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let url = format!("{HANDLE_SCHEME}mangaread/{}-{n}", self.instance);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), bytes);
        ObjectUrl(url)
    }

    /// Bytes behind a handle URL, or `None` once revoked or if unknown.
    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    /// Reclaim a handle. Revoking twice is a no-op.
    pub fn revoke(&self, url: &ObjectUrl) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url.as_str());
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
