//! Core types and shared functionality for mangaread.
//!
//! This crate provides:
//! - Durable namespaced key-value storage with a SQLite backend
//! - Offline chapter and metadata caches
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod store;

pub use cache::{ChapterCache, ManifestPage, MetadataCache, ObjectUrl, ObjectUrlRegistry};
pub use config::AppConfig;
pub use error::Error;
pub use store::{CacheDb, KvStore, Namespace, StoredValue};
