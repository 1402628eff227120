//! Fake collaborators for reader tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Map;

use mangaread_client::{
    CatalogError, ChapterCatalog, ChapterImages, ChapterMetadata, FeedQuery, Listing, MangaDetails, Quality, SearchQuery,
};
use mangaread_core::cache::{ByteFetcher, ChapterCache, ManifestPage, ObjectUrlRegistry, is_handle_url};
use mangaread_core::{CacheDb, Error};

use crate::session::ReaderDeps;

pub(crate) fn page_url(file_name: &str) -> String {
    format!("https://node.test/data/hash/{file_name}")
}

/// Catalog serving one chapter with `pages` pages, or failing while `down`.
pub(crate) struct FakeCatalog {
    pub pages: Vec<String>,
    pub down: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn with_pages(count: usize) -> Self {
        Self {
            pages: (1..=count).map(|n| format!("{n}.png")).collect(),
            down: Mutex::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_down(&self, down: bool) {
        *self.down.lock().unwrap() = down;
    }

    fn check(&self) -> Result<(), CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.down.lock().unwrap() { Err(CatalogError::HttpError { status: 503 }) } else { Ok(()) }
    }
}

#[async_trait]
impl ChapterCatalog for FakeCatalog {
    async fn chapter_metadata(&self, chapter_id: &str) -> Result<ChapterMetadata, CatalogError> {
        self.check()?;
        Ok(ChapterMetadata {
            id: chapter_id.to_string(),
            title: Some("Test".into()),
            chapter: Some("1".into()),
            volume: None,
            pages: Some(self.pages.len() as u32),
            translated_language: Some("en".into()),
            scanlation_group: "Unknown".into(),
            manga_id: Some("m-1".into()),
            extra: Map::new(),
        })
    }

    async fn chapter_images(&self, _chapter_id: &str, _quality: Quality) -> Result<ChapterImages, CatalogError> {
        self.check()?;
        let images: Vec<ManifestPage> = self
            .pages
            .iter()
            .map(|name| ManifestPage::new(name.clone(), page_url(name)))
            .collect();
        Ok(ChapterImages {
            base_url: "https://node.test".into(),
            hash: "hash".into(),
            total_pages: images.len(),
            images,
        })
    }

    async fn manga(&self, manga_id: &str) -> Result<MangaDetails, CatalogError> {
        Err(CatalogError::NotFound(format!("/manga/{manga_id}")))
    }

    async fn search_manga(&self, _query: &SearchQuery) -> Result<Listing<MangaDetails>, CatalogError> {
        self.check()?;
        Ok(Listing { data: Vec::new(), limit: 20, offset: 0, total: 0 })
    }

    async fn manga_feed(&self, manga_id: &str, _query: &FeedQuery) -> Result<Listing<ChapterMetadata>, CatalogError> {
        Err(CatalogError::NotFound(format!("/manga/{manga_id}/feed")))
    }
}

/// Serves the URL itself as page bytes. URLs whose path (query ignored) is
/// in `failing` error out; handle URLs resolve through the registry.
pub(crate) struct FakeFetcher {
    pub handles: Arc<ObjectUrlRegistry>,
    pub failing: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new(handles: Arc<ObjectUrlRegistry>) -> Self {
        Self { handles, failing: Mutex::new(HashSet::new()), calls: Mutex::new(Vec::new()) }
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn heal(&self, url: &str) {
        self.failing.lock().unwrap().remove(url);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ByteFetcher for FakeFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, Error> {
        self.calls.lock().unwrap().push(url.to_string());
        if is_handle_url(url) {
            return self.handles.resolve(url).ok_or_else(|| Error::HandleRevoked(url.to_string()));
        }
        let path = url.split('?').next().unwrap_or(url);
        if self.failing.lock().unwrap().contains(path) {
            return Err(Error::HttpError(format!("status 500 for {url}")));
        }
        Ok(Bytes::from(path.to_string()))
    }
}

pub(crate) struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub fetcher: Arc<FakeFetcher>,
    pub handles: Arc<ObjectUrlRegistry>,
    pub deps: ReaderDeps,
}

pub(crate) async fn harness(pages: usize) -> Harness {
    let handles = Arc::new(ObjectUrlRegistry::new());
    let catalog = Arc::new(FakeCatalog::with_pages(pages));
    let fetcher = Arc::new(FakeFetcher::new(handles.clone()));
    let db = CacheDb::open_in_memory().await.unwrap();
    let cache = ChapterCache::new(Arc::new(db), fetcher.clone(), handles.clone());

    let deps = ReaderDeps { catalog: catalog.clone(), cache, fetcher: fetcher.clone() };
    Harness { catalog, fetcher, handles, deps }
}
