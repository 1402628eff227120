//! Test fixtures for tool implementations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use rmcp::model::CallToolResult;
use serde_json::{Map, Value};

use mangaread_client::{
    CatalogError, ChapterCatalog, ChapterImages, ChapterMetadata, FeedQuery, Listing, MangaDetails, Quality, SearchQuery,
};
use mangaread_core::cache::{ByteFetcher, ChapterCache, ManifestPage, ObjectUrlRegistry, is_handle_url};
use mangaread_core::{CacheDb, Error, MetadataCache};
use mangaread_reader::{ReaderDeps, SessionOptions};

use crate::state::AppState;

/// Catalog with one manga, `m-1`, whose chapters `ch-1`..`ch-3` have three pages each.
pub(crate) struct StubCatalog {
    pub down: AtomicBool,
}

pub(crate) fn details(manga_id: &str) -> MangaDetails {
    MangaDetails {
        id: manga_id.to_string(),
        title: BTreeMap::from([("en".to_string(), "Berserk".to_string())]),
        description: BTreeMap::new(),
        status: Some("ongoing".into()),
        year: Some(1989),
        cover_url: None,
        author: "Miura Kentaro".into(),
        artist: "Miura Kentaro".into(),
        extra: Map::new(),
    }
}

pub(crate) fn chapter(chapter_id: &str) -> ChapterMetadata {
    ChapterMetadata {
        id: chapter_id.to_string(),
        title: None,
        chapter: chapter_id.strip_prefix("ch-").map(str::to_string),
        volume: None,
        pages: Some(3),
        translated_language: Some("en".into()),
        scanlation_group: "Unknown".into(),
        manga_id: Some("m-1".into()),
        extra: Map::new(),
    }
}

impl StubCatalog {
    fn check(&self) -> Result<(), CatalogError> {
        if self.down.load(Ordering::SeqCst) { Err(CatalogError::HttpError { status: 503 }) } else { Ok(()) }
    }
}

#[async_trait]
impl ChapterCatalog for StubCatalog {
    async fn chapter_metadata(&self, chapter_id: &str) -> Result<ChapterMetadata, CatalogError> {
        self.check()?;
        Ok(chapter(chapter_id))
    }

    async fn chapter_images(&self, _chapter_id: &str, _quality: Quality) -> Result<ChapterImages, CatalogError> {
        self.check()?;
        let images: Vec<ManifestPage> = (1..=3)
            .map(|n| ManifestPage::new(format!("{n}.png"), format!("https://node.test/data/h/{n}.png")))
            .collect();
        Ok(ChapterImages { base_url: "https://node.test".into(), hash: "h".into(), total_pages: 3, images })
    }

    async fn manga(&self, manga_id: &str) -> Result<MangaDetails, CatalogError> {
        self.check()?;
        if manga_id == "m-1" { Ok(details(manga_id)) } else { Err(CatalogError::NotFound(format!("/manga/{manga_id}"))) }
    }

    async fn search_manga(&self, query: &SearchQuery) -> Result<Listing<MangaDetails>, CatalogError> {
        self.check()?;
        let matches = query
            .title
            .as_deref()
            .is_none_or(|title| "berserk".contains(&title.to_lowercase()));
        let data = if matches { vec![details("m-1")] } else { Vec::new() };
        Ok(Listing { total: data.len() as u32, data, limit: query.limit(), offset: query.offset() })
    }

    async fn manga_feed(&self, manga_id: &str, query: &FeedQuery) -> Result<Listing<ChapterMetadata>, CatalogError> {
        self.check()?;
        if manga_id != "m-1" {
            return Err(CatalogError::NotFound(format!("/manga/{manga_id}/feed")));
        }
        let data = vec![chapter("ch-3"), chapter("ch-2"), chapter("ch-1")];
        Ok(Listing { total: 3, data, limit: query.limit(), offset: query.offset() })
    }
}

/// Serves each URL's text as its bytes.
pub(crate) struct EchoFetcher {
    pub handles: Arc<ObjectUrlRegistry>,
}

#[async_trait]
impl ByteFetcher for EchoFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, Error> {
        if is_handle_url(url) {
            return self.handles.resolve(url).ok_or_else(|| Error::HandleRevoked(url.to_string()));
        }
        Ok(Bytes::from(url.to_string()))
    }
}

pub(crate) struct Fixture {
    pub catalog: Arc<StubCatalog>,
    pub state: AppState,
}

pub(crate) async fn fixture() -> Fixture {
    let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let handles = Arc::new(ObjectUrlRegistry::new());
    let catalog = Arc::new(StubCatalog { down: AtomicBool::new(false) });
    let fetcher = Arc::new(EchoFetcher { handles: handles.clone() });
    let cache = ChapterCache::new(db.clone(), fetcher.clone(), handles);

    let deps = ReaderDeps { catalog: catalog.clone(), cache, fetcher };
    let state = AppState::new(deps, MetadataCache::new(db), SessionOptions::default());
    Fixture { catalog, state }
}

/// Parse the JSON text content of a tool result.
pub(crate) fn output(result: &CallToolResult) -> Value {
    let content = serde_json::to_value(&result.content[0]).unwrap();
    let text = content
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
