//! Manga metadata cache.
//!
//! Stores arbitrary JSON-object metadata keyed by `manga_{id}` in the
//! metadata namespace, stamped with the time it was cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::store::{KvStore, Namespace, StoredValue};

fn metadata_key(manga_id: &str) -> String {
    format!("manga_{manga_id}")
}

/// Cached metadata with its cache timestamp.
///
/// `T` must serialize as a JSON object; its fields are stored alongside
/// `cachedAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMetadata<T> {
    #[serde(flatten)]
    pub data: T,
    #[serde(rename = "cachedAt")]
    pub cached_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct MetadataCache {
    store: Arc<dyn KvStore>,
}

impl MetadataCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Store metadata for a manga, replacing any previous entry.
    pub async fn cache_manga_metadata<T: Serialize>(&self, manga_id: &str, data: &T) -> bool {
        match self.try_cache_manga_metadata(manga_id, data).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(manga_id, error = %e, "error caching manga metadata");
                false
            }
        }
    }

    pub async fn try_cache_manga_metadata<T: Serialize>(&self, manga_id: &str, data: &T) -> Result<(), Error> {
        if manga_id.is_empty() {
            return Err(Error::InvalidInput("manga_id cannot be empty".into()));
        }

        let record = serde_json::to_value(CachedMetadata { data, cached_at: Utc::now() })?;
        self.store
            .set(Namespace::Metadata, &metadata_key(manga_id), StoredValue::Record(record))
            .await
    }

    /// Cached metadata for a manga. `None` on miss, decode failure or error.
    pub async fn get_cached_manga_metadata<T: DeserializeOwned>(&self, manga_id: &str) -> Option<CachedMetadata<T>> {
        match self.try_get_cached_manga_metadata(manga_id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(manga_id, error = %e, "error retrieving manga metadata");
                None
            }
        }
    }

    pub async fn try_get_cached_manga_metadata<T: DeserializeOwned>(
        &self, manga_id: &str,
    ) -> Result<Option<CachedMetadata<T>>, Error> {
        let Some(value) = self.store.get(Namespace::Metadata, &metadata_key(manga_id)).await? else {
            return Ok(None);
        };
        let record = value
            .into_record()
            .ok_or_else(|| Error::CorruptEntry(format!("manga {manga_id}: expected a record value")))?;
        Ok(Some(serde_json::from_value(record)?))
    }

    pub async fn remove_manga_metadata(&self, manga_id: &str) -> bool {
        match self.store.remove(Namespace::Metadata, &metadata_key(manga_id)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(manga_id, error = %e, "error removing manga metadata");
                false
            }
        }
    }
}
