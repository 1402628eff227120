//! Offline caches for chapters and manga metadata.
//!
//! Both caches sit on top of [`crate::store::KvStore`]:
//!
//! - [`ChapterCache`] persists page images per chapter, verified by SHA-256
//! - [`MetadataCache`] persists JSON metadata per manga
//! - [`ObjectUrlRegistry`] hands out session-local handles to cached bytes

pub mod chapters;
pub mod digest;
pub mod handles;
pub mod metadata;

pub use chapters::{
    ByteFetcher, CacheOutcome, CacheReport, CacheSize, CachedChapter, CachedChapterView, CachedImage, CachedPage,
    ChapterCache, DEFAULT_CACHE_CONCURRENCY, ManifestPage,
};
pub use handles::{HANDLE_SCHEME, ObjectUrl, ObjectUrlRegistry, is_handle_url};
pub use metadata::{CachedMetadata, MetadataCache};
