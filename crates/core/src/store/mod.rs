//! Durable namespaced key-value storage.
//!
//! The caches in [`crate::cache`] only talk to the [`KvStore`] trait. The
//! production backend is [`CacheDb`], a SQLite database driven through
//! tokio-rusqlite; tests substitute in-memory databases or failing stores.
//!
//! - Two namespaces: `chapters` and `metadata`
//! - Values are either opaque blobs or JSON records
//! - A single `set` is one atomic UPSERT

pub mod connection;
pub mod kv;
pub mod migrations;

use async_trait::async_trait;
use bytes::Bytes;

use crate::Error;

pub use connection::CacheDb;

/// Storage namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Chapters,
    Metadata,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Chapters => "chapters",
            Namespace::Metadata => "metadata",
        }
    }
}

/// A value held by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// Opaque binary payload.
    Blob(Bytes),
    /// Structured record.
    Record(serde_json::Value),
}

impl StoredValue {
    pub fn kind(&self) -> &'static str {
        match self {
            StoredValue::Blob(_) => "blob",
            StoredValue::Record(_) => "record",
        }
    }

    pub fn into_blob(self) -> Option<Bytes> {
        match self {
            StoredValue::Blob(bytes) => Some(bytes),
            StoredValue::Record(_) => None,
        }
    }

    pub fn into_record(self) -> Option<serde_json::Value> {
        match self {
            StoredValue::Record(value) => Some(value),
            StoredValue::Blob(_) => None,
        }
    }
}

/// Namespaced key-value storage capability.
///
/// Operations on distinct keys are independent; no cross-key locking is
/// provided or needed.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<StoredValue>, Error>;

    async fn set(&self, ns: Namespace, key: &str, value: StoredValue) -> Result<(), Error>;

    /// Remove a key. Removing a missing key is not an error.
    async fn remove(&self, ns: Namespace, key: &str) -> Result<(), Error>;

    /// All keys of a namespace, in ascending order.
    async fn keys(&self, ns: Namespace) -> Result<Vec<String>, Error>;

    async fn clear(&self, ns: Namespace) -> Result<(), Error>;
}
