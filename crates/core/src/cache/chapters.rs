//! Offline chapter cache.
//!
//! Maps a chapter id to the page images persisted for offline reading.
//!
//! - Page bytes are fetched concurrently with per-page failure isolation
//! - Successful pages are persisted as one record in one write; a chapter
//!   where no page could be fetched is never stored
//! - Reads mint fresh [`ObjectUrl`] handles on every call
//!
//! Every public operation is total: storage failures are logged and reported
//! as `false`/`None`. The `try_*` variants keep the underlying [`Error`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::digest::page_digest;
use super::handles::{ObjectUrl, ObjectUrlRegistry};
use crate::Error;
use crate::store::{KvStore, Namespace, StoredValue};

/// Default number of page downloads in flight while caching.
pub const DEFAULT_CACHE_CONCURRENCY: usize = 6;

/// Fetch-bytes capability used to download page images.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, Error>;
}

/// One entry of a page manifest, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPage {
    pub file_name: String,
    pub url: String,
    /// Remote URL the bytes originally came from, when `url` is a local handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ManifestPage {
    pub fn new(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { file_name: file_name.into(), url: url.into(), origin: None }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// A persisted page image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPage {
    pub file_name: String,
    pub blob: Bytes,
    pub source_url: String,
    pub digest: String,
}

/// A persisted chapter. Pages are stored in reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedChapter {
    pub pages: Vec<CachedPage>,
    pub cached_at: DateTime<Utc>,
}

impl CachedChapter {
    fn verify(&self, chapter_id: &str) -> Result<(), Error> {
        if self.pages.is_empty() {
            return Err(Error::CorruptEntry(format!("{chapter_id}: no pages")));
        }
        for page in &self.pages {
            if page.blob.is_empty() || page_digest(&page.blob) != page.digest {
                return Err(Error::CorruptEntry(format!("{chapter_id}: page {} failed digest check", page.file_name)));
            }
        }
        Ok(())
    }

    pub fn total_bytes(&self) -> u64 {
        self.pages.iter().map(|page| page.blob.len() as u64).sum()
    }
}

/// A cached page as handed to a reader: a fresh handle plus its origin.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub file_name: String,
    pub url: ObjectUrl,
    pub original_url: String,
}

/// Result of reading a cached chapter.
#[derive(Debug, Clone)]
pub struct CachedChapterView {
    pub images: Vec<CachedImage>,
    pub cached_at: DateTime<Utc>,
}

/// Pages stored and dropped by a caching request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheReport {
    pub stored: usize,
    pub dropped: Vec<String>,
}

/// Outcome of a caching request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Every page was stored.
    Complete { pages: usize },
    /// Some pages could not be fetched and were left out.
    Partial { stored: usize, dropped: Vec<String> },
    /// Nothing was stored.
    Failed,
}

impl CacheOutcome {
    /// Whether a chapter entry now exists (complete or partial).
    pub fn is_stored(&self) -> bool {
        !matches!(self, CacheOutcome::Failed)
    }
}

impl From<CacheReport> for CacheOutcome {
    fn from(report: CacheReport) -> Self {
        if report.dropped.is_empty() {
            CacheOutcome::Complete { pages: report.stored }
        } else {
            CacheOutcome::Partial { stored: report.stored, dropped: report.dropped }
        }
    }
}

/// Aggregate size of the chapter cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheSize {
    pub chapter_count: usize,
    pub total_bytes: u64,
}

impl CacheSize {
    pub fn size_mb(&self) -> String {
        format!("{:.2}", self.total_bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Offline chapter cache over a [`KvStore`].
#[derive(Clone)]
pub struct ChapterCache {
    store: Arc<dyn KvStore>,
    fetcher: Arc<dyn ByteFetcher>,
    handles: Arc<ObjectUrlRegistry>,
    concurrency: usize,
}

impl ChapterCache {
    pub fn new(store: Arc<dyn KvStore>, fetcher: Arc<dyn ByteFetcher>, handles: Arc<ObjectUrlRegistry>) -> Self {
        Self { store, fetcher, handles, concurrency: DEFAULT_CACHE_CONCURRENCY }
    }

    /// Limit concurrent page downloads (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Registry holding the handles minted by this cache.
    pub fn handles(&self) -> &Arc<ObjectUrlRegistry> {
        &self.handles
    }

    /// Cache a chapter. Returns `true` when an entry was stored, even if some
    /// pages were dropped.
    pub async fn cache_chapter(&self, chapter_id: &str, manifest: &[ManifestPage]) -> bool {
        self.cache_chapter_outcome(chapter_id, manifest).await.is_stored()
    }

    /// Cache a chapter, distinguishing complete from partial success.
    pub async fn cache_chapter_outcome(&self, chapter_id: &str, manifest: &[ManifestPage]) -> CacheOutcome {
        match self.try_cache_chapter(chapter_id, manifest).await {
            Ok(report) => {
                if !report.dropped.is_empty() {
                    tracing::warn!(
                        chapter_id,
                        stored = report.stored,
                        dropped = report.dropped.len(),
                        "chapter cached with missing pages"
                    );
                }
                report.into()
            }
            Err(e) => {
                tracing::warn!(chapter_id, error = %e, "error caching chapter");
                CacheOutcome::Failed
            }
        }
    }

    /// Fetch every manifest page and persist the successful ones.
    ///
    /// # Errors
    ///
    /// `Error::NothingCached` when no page could be fetched (nothing is
    /// written), or the storage error of the persisting write.
    pub async fn try_cache_chapter(&self, chapter_id: &str, manifest: &[ManifestPage]) -> Result<CacheReport, Error> {
        if chapter_id.is_empty() {
            return Err(Error::InvalidInput("chapter_id cannot be empty".into()));
        }

        let fetched = self.fetch_all(manifest).await;

        let mut pages = Vec::with_capacity(manifest.len());
        let mut dropped = Vec::new();
        for (entry, result) in manifest.iter().zip(fetched) {
            match result {
                Ok(blob) => pages.push(CachedPage {
                    file_name: entry.file_name.clone(),
                    digest: page_digest(&blob),
                    blob,
                    source_url: entry.origin.clone().unwrap_or_else(|| entry.url.clone()),
                }),
                Err(e) => {
                    tracing::warn!(chapter_id, file_name = %entry.file_name, error = %e, "failed to cache page");
                    dropped.push(entry.file_name.clone());
                }
            }
        }

        if pages.is_empty() {
            return Err(Error::NothingCached(chapter_id.to_string()));
        }

        let record = CachedChapter { pages, cached_at: Utc::now() };
        let stored = record.pages.len();
        let encoded = bincode::serialize(&record)?;
        self.store
            .set(Namespace::Chapters, chapter_id, StoredValue::Blob(Bytes::from(encoded)))
            .await?;

        tracing::info!(chapter_id, stored, bytes = record.total_bytes(), "chapter cached");
        Ok(CacheReport { stored, dropped })
    }

    /// Results in manifest order.
    async fn fetch_all(&self, manifest: &[ManifestPage]) -> Vec<Result<Bytes, Error>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (index, page) in manifest.iter().enumerate() {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            let url = page.url.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = match fetcher.fetch_bytes(&url).await {
                    Ok(bytes) if bytes.is_empty() => Err(Error::FetchFailed(format!("empty body: {url}"))),
                    other => other,
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<Bytes, Error>>> = manifest.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::warn!(error = %e, "page fetch task failed"),
            }
        }

        results
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(Error::FetchFailed("page fetch task aborted".into()))))
            .collect()
    }

    /// Read a cached chapter, minting fresh handles. `None` on miss or error.
    pub async fn get_cached_chapter(&self, chapter_id: &str) -> Option<CachedChapterView> {
        match self.try_get_cached_chapter(chapter_id).await {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(chapter_id, error = %e, "error retrieving cached chapter");
                None
            }
        }
    }

    pub async fn try_get_cached_chapter(&self, chapter_id: &str) -> Result<Option<CachedChapterView>, Error> {
        let Some(record) = self.load_record(chapter_id).await? else {
            return Ok(None);
        };
        record.verify(chapter_id)?;

        let images = record
            .pages
            .into_iter()
            .map(|page| CachedImage {
                file_name: page.file_name,
                url: self.handles.create(page.blob),
                original_url: page.source_url,
            })
            .collect();

        tracing::debug!(chapter_id, "cache hit");
        Ok(Some(CachedChapterView { images, cached_at: record.cached_at }))
    }

    async fn load_record(&self, chapter_id: &str) -> Result<Option<CachedChapter>, Error> {
        let Some(value) = self.store.get(Namespace::Chapters, chapter_id).await? else {
            return Ok(None);
        };
        let blob = value
            .into_blob()
            .ok_or_else(|| Error::CorruptEntry(format!("{chapter_id}: expected a blob value")))?;
        Ok(Some(bincode::deserialize(&blob)?))
    }

    /// Presence check by key enumeration.
    pub async fn is_chapter_cached(&self, chapter_id: &str) -> bool {
        match self.try_is_chapter_cached(chapter_id).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(chapter_id, error = %e, "error checking cache");
                false
            }
        }
    }

    pub async fn try_is_chapter_cached(&self, chapter_id: &str) -> Result<bool, Error> {
        let keys = self.store.keys(Namespace::Chapters).await?;
        Ok(keys.iter().any(|key| key == chapter_id))
    }

    /// Ids of every cached chapter. Empty on error.
    pub async fn cached_chapter_ids(&self) -> Vec<String> {
        self.store
            .keys(Namespace::Chapters)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "error listing cached chapters");
                Vec::new()
            })
    }

    pub async fn remove_cached_chapter(&self, chapter_id: &str) -> bool {
        match self.store.remove(Namespace::Chapters, chapter_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(chapter_id, error = %e, "error removing cached chapter");
                false
            }
        }
    }

    pub async fn clear_all_cached_chapters(&self) -> bool {
        match self.store.clear(Namespace::Chapters).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "error clearing chapter cache");
                false
            }
        }
    }

    /// Sum of stored blob sizes across all chapters. Zero on error.
    pub async fn cache_size(&self) -> CacheSize {
        self.try_cache_size().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "error calculating cache size");
            CacheSize::default()
        })
    }

    /// Entries that fail to decode are skipped; storage errors propagate.
    pub async fn try_cache_size(&self) -> Result<CacheSize, Error> {
        let keys = self.store.keys(Namespace::Chapters).await?;
        let mut total_bytes = 0u64;

        for key in &keys {
            match self.load_record(key).await {
                Ok(Some(record)) => total_bytes += record.total_bytes(),
                Ok(None) => {}
                Err(e @ (Error::Codec(_) | Error::CorruptEntry(_))) => {
                    tracing::warn!(chapter_id = %key, error = %e, "skipping undecodable chapter");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(CacheSize { chapter_count: keys.len(), total_bytes })
    }
}
