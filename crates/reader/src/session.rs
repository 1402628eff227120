//! Reader session state machine.
//!
//! One [`ReaderSession`] exists per open chapter. It owns the page list, the
//! current page index, the prefetch and per-page error sets, and the overlay
//! controls.
//!
//! ### Lifecycle
//!
//! `Loading -> Ready`, or `Loading -> Failed` when the chapter metadata or
//! page manifest cannot be fetched. `load()` again from `Failed` retries.
//! Page-level failures never leave `Ready`; they are retried per page.
//!
//! ### Image loads
//!
//! Display and prefetch loads run as spawned tasks tagged with the session
//! generation. Their completions are applied by [`ReaderSession::tick`],
//! [`ReaderSession::next_event`] or [`ReaderSession::settle`]; completions
//! from an earlier generation are discarded. Methods that start loads must be
//! called within a Tokio runtime.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tokio::task::{JoinError, JoinSet};

use mangaread_client::{ChapterCatalog, ChapterMetadata, Quality, cache_bust};
use mangaread_core::cache::{ByteFetcher, CacheOutcome, CachedImage, ChapterCache, ManifestPage};
use mangaread_core::{AppConfig, Error};

use crate::controls::{Controls, DEFAULT_IDLE_HIDE};

/// Default number of pages loaded ahead of the current one.
pub const DEFAULT_PREFETCH_AHEAD: usize = 3;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub quality: Quality,
    pub prefetch_ahead: usize,
    pub idle_hide: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { quality: Quality::Data, prefetch_ahead: DEFAULT_PREFETCH_AHEAD, idle_hide: DEFAULT_IDLE_HIDE }
    }
}

impl From<&AppConfig> for SessionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            quality: config.quality.parse().unwrap_or_default(),
            prefetch_ahead: config.prefetch_ahead,
            idle_hide: config.idle_hide(),
        }
    }
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct ReaderDeps {
    pub catalog: Arc<dyn ChapterCatalog>,
    pub cache: ChapterCache,
    pub fetcher: Arc<dyn ByteFetcher>,
}

/// The catalog entry a chapter was opened from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MangaRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Where closing the reader leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "to", content = "manga_id", rename_all = "snake_case")]
pub enum NavTarget {
    /// The parent manga's page.
    Manga(String),
    /// Whatever view preceded the reader.
    Back,
}

/// Side effects the session asks its host to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    ScrollToTop,
    Navigate(NavTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Loading,
    Loaded,
    Error,
}

/// The displayed page.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub chapter_id: String,
    pub page: usize,
    pub total_pages: usize,
    pub file_name: String,
    pub url: String,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    pub controls_visible: bool,
    pub cache_sourced: bool,
    pub is_cached: bool,
    pub page_errors: Vec<usize>,
    pub prefetched: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manga: Option<MangaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<ChapterMetadata>,
}

/// Snapshot of what the reader shows. Every non-page state has an exit:
/// retry for `Failed`, close for the rest.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReaderView {
    Loading { chapter_id: String },
    Failed { chapter_id: String, message: String },
    NoPages { chapter_id: String },
    Page(Box<PageView>),
    Closed { chapter_id: String },
}

/// Page list, sourced from the cache or the network but never both.
#[derive(Debug)]
enum Pages {
    Empty,
    Cached(Vec<CachedImage>),
    Remote(Vec<ManifestPage>),
}

impl Pages {
    fn len(&self) -> usize {
        match self {
            Pages::Empty => 0,
            Pages::Cached(images) => images.len(),
            Pages::Remote(pages) => pages.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn url(&self, index: usize) -> Option<&str> {
        match self {
            Pages::Empty => None,
            Pages::Cached(images) => images.get(index).map(|image| image.url.as_str()),
            Pages::Remote(pages) => pages.get(index).map(|page| page.url.as_str()),
        }
    }

    fn file_name(&self, index: usize) -> Option<&str> {
        match self {
            Pages::Empty => None,
            Pages::Cached(images) => images.get(index).map(|image| image.file_name.as_str()),
            Pages::Remote(pages) => pages.get(index).map(|page| page.file_name.as_str()),
        }
    }

    /// Current pages as a caching manifest. Cached pages keep their remote
    /// origin.
    fn manifest(&self) -> Vec<ManifestPage> {
        match self {
            Pages::Empty => Vec::new(),
            Pages::Cached(images) => images
                .iter()
                .map(|image| {
                    ManifestPage::new(image.file_name.clone(), image.url.as_str()).with_origin(image.original_url.clone())
                })
                .collect(),
            Pages::Remote(pages) => pages.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPurpose {
    Display,
    Prefetch,
}

#[derive(Debug)]
struct LoadEvent {
    generation: u64,
    /// Display attempt number; zero for prefetches.
    attempt: u64,
    index: usize,
    purpose: LoadPurpose,
    outcome: Result<Bytes, Error>,
}

pub struct ReaderSession {
    chapter_id: String,
    parent: Option<MangaRef>,
    options: SessionOptions,
    deps: ReaderDeps,

    phase: Phase,
    pages: Pages,
    metadata: Option<ChapterMetadata>,
    is_cached: bool,
    closed: bool,

    current_page: usize,
    current_image: Option<Bytes>,
    prefetched: HashSet<usize>,
    prefetch_pending: HashSet<usize>,
    page_errors: HashSet<usize>,
    /// Loaded bytes for upcoming pages.
    ready: HashMap<usize, Bytes>,
    retry_tokens: HashMap<usize, String>,
    retry_seq: u64,
    /// Latest in-flight display attempt per page. Older attempts are ignored.
    display_attempts: HashMap<usize, u64>,
    attempt_seq: u64,

    controls: Controls,
    generation: u64,
    loads: JoinSet<LoadEvent>,
    effects: Vec<Effect>,
}

impl ReaderSession {
    pub fn new(chapter_id: impl Into<String>, deps: ReaderDeps, options: SessionOptions) -> Self {
        let controls = Controls::new(options.idle_hide);
        Self {
            chapter_id: chapter_id.into(),
            parent: None,
            options,
            deps,
            phase: Phase::Loading,
            pages: Pages::Empty,
            metadata: None,
            is_cached: false,
            closed: false,
            current_page: 0,
            current_image: None,
            prefetched: HashSet::new(),
            prefetch_pending: HashSet::new(),
            page_errors: HashSet::new(),
            ready: HashMap::new(),
            retry_tokens: HashMap::new(),
            retry_seq: 0,
            display_attempts: HashMap::new(),
            attempt_seq: 0,
            controls,
            generation: 0,
            loads: JoinSet::new(),
            effects: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: MangaRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_url(&self, index: usize) -> Option<&str> {
        self.pages.url(index)
    }

    pub fn current_image(&self) -> Option<&Bytes> {
        self.current_image.as_ref()
    }

    pub fn metadata(&self) -> Option<&ChapterMetadata> {
        self.metadata.as_ref()
    }

    pub fn controls_visible(&self) -> bool {
        self.controls.is_visible()
    }

    pub fn is_cache_sourced(&self) -> bool {
        matches!(self.pages, Pages::Cached(_))
    }

    /// Whether the chapter is known to be in the offline cache.
    pub fn is_cached(&self) -> bool {
        self.is_cached
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn page_errors(&self) -> Vec<usize> {
        sorted(&self.page_errors)
    }

    pub fn prefetched(&self) -> Vec<usize> {
        sorted(&self.prefetched)
    }

    pub fn has_pending_loads(&self) -> bool {
        !self.loads.is_empty()
    }

    /// Load (or reload) the chapter.
    ///
    /// A cache hit populates pages from the offline cache without touching
    /// the network. A miss fetches metadata and the page manifest
    /// concurrently; if either fails the session enters [`Phase::Failed`].
    pub async fn load(&mut self) {
        if self.closed {
            return;
        }

        self.reset();

        if let Some(cached) = self.deps.cache.get_cached_chapter(&self.chapter_id).await {
            tracing::info!(chapter_id = %self.chapter_id, pages = cached.images.len(), "loading chapter from cache");
            self.pages = Pages::Cached(cached.images);
            self.is_cached = true;
        } else {
            let (metadata, images) = tokio::join!(
                self.deps.catalog.chapter_metadata(&self.chapter_id),
                self.deps.catalog.chapter_images(&self.chapter_id, self.options.quality),
            );

            match metadata.and_then(|metadata| images.map(|images| (metadata, images))) {
                Ok((metadata, images)) => {
                    tracing::info!(chapter_id = %self.chapter_id, pages = images.total_pages, "loaded chapter manifest");
                    self.metadata = Some(metadata);
                    self.pages = Pages::Remote(images.images);
                    self.is_cached = self.deps.cache.is_chapter_cached(&self.chapter_id).await;
                }
                Err(e) => {
                    let err = Error::from(e);
                    tracing::warn!(chapter_id = %self.chapter_id, error = %err, "failed to load chapter");
                    self.phase = Phase::Failed(err.to_string());
                    return;
                }
            }
        }

        self.phase = Phase::Ready;
        self.controls.reveal();
        if !self.pages.is_empty() {
            self.show_page();
            self.prefetch();
        }
    }

    /// Drop all per-load state. Outstanding loads become stale.
    fn reset(&mut self) {
        self.generation += 1;
        self.revoke_handles();
        self.phase = Phase::Loading;
        self.metadata = None;
        self.current_page = 0;
        self.current_image = None;
        self.prefetched.clear();
        self.prefetch_pending.clear();
        self.page_errors.clear();
        self.ready.clear();
        self.retry_tokens.clear();
        self.display_attempts.clear();
    }

    fn revoke_handles(&mut self) {
        if let Pages::Cached(images) = &self.pages {
            let registry = self.deps.cache.handles();
            for image in images {
                registry.revoke(&image.url);
            }
        }
        self.pages = Pages::Empty;
    }

    fn navigable(&self) -> bool {
        !self.closed && self.phase == Phase::Ready && !self.pages.is_empty()
    }

    /// Next page. No-op on the last page. Returns whether the page changed.
    pub fn advance(&mut self) -> bool {
        if !self.navigable() || self.current_page + 1 >= self.pages.len() {
            return false;
        }
        self.current_page += 1;
        self.page_changed();
        true
    }

    /// Previous page. No-op on the first page. Returns whether the page changed.
    pub fn retreat(&mut self) -> bool {
        if !self.navigable() || self.current_page == 0 {
            return false;
        }
        self.current_page -= 1;
        self.page_changed();
        true
    }

    fn page_changed(&mut self) {
        self.effects.push(Effect::ScrollToTop);
        self.controls.reveal();
        self.show_page();
        self.prefetch();
    }

    fn show_page(&mut self) {
        let index = self.current_page;
        self.current_image = None;

        if let Some(bytes) = self.ready.remove(&index) {
            self.page_errors.remove(&index);
            self.current_image = Some(bytes);
        } else if !self.page_errors.contains(&index) {
            self.spawn_load(index, LoadPurpose::Display);
        }

        let depth = self.options.prefetch_ahead;
        self.ready.retain(|&i, _| i > index && i <= index + depth);
    }

    fn prefetch(&mut self) {
        let upcoming: Vec<usize> = (self.current_page + 1..self.pages.len())
            .take(self.options.prefetch_ahead)
            .filter(|index| !self.prefetched.contains(index) && !self.prefetch_pending.contains(index))
            .collect();

        for index in upcoming {
            self.prefetch_pending.insert(index);
            self.spawn_load(index, LoadPurpose::Prefetch);
        }
    }

    fn load_url(&self, index: usize) -> Option<String> {
        let url = self.pages.url(index)?;
        Some(match self.retry_tokens.get(&index) {
            Some(token) => cache_bust(url, token),
            None => url.to_string(),
        })
    }

    fn spawn_load(&mut self, index: usize, purpose: LoadPurpose) {
        let Some(url) = self.load_url(index) else {
            return;
        };
        let fetcher = self.deps.fetcher.clone();
        let generation = self.generation;
        let attempt = match purpose {
            LoadPurpose::Display => {
                self.attempt_seq += 1;
                self.display_attempts.insert(index, self.attempt_seq);
                self.attempt_seq
            }
            LoadPurpose::Prefetch => 0,
        };

        self.loads.spawn(async move {
            let outcome = fetcher.fetch_bytes(&url).await;
            LoadEvent { generation, attempt, index, purpose, outcome }
        });
    }

    fn apply_joined(&mut self, joined: Result<LoadEvent, JoinError>) {
        match joined {
            Ok(event) => self.apply_load(event),
            Err(e) => tracing::warn!(error = %e, "image load task failed"),
        }
    }

    fn apply_load(&mut self, event: LoadEvent) {
        if event.generation != self.generation {
            tracing::debug!(index = event.index, "discarding stale image load");
            return;
        }

        let index = event.index;
        if event.purpose == LoadPurpose::Display {
            if self.display_attempts.get(&index) != Some(&event.attempt) {
                tracing::debug!(index, attempt = event.attempt, "discarding superseded page load");
                return;
            }
            self.display_attempts.remove(&index);
        }

        match (event.purpose, event.outcome) {
            (LoadPurpose::Prefetch, Ok(bytes)) => {
                self.prefetch_pending.remove(&index);
                self.prefetched.insert(index);
                self.store_loaded(index, bytes);
            }
            (LoadPurpose::Prefetch, Err(e)) => {
                self.prefetch_pending.remove(&index);
                tracing::debug!(index, error = %e, "prefetch failed");
            }
            (LoadPurpose::Display, Ok(bytes)) if index == self.current_page => {
                self.page_errors.remove(&index);
                self.current_image = Some(bytes);
            }
            (LoadPurpose::Display, Ok(bytes)) => self.store_loaded(index, bytes),
            (LoadPurpose::Display, Err(e)) => {
                if index == self.current_page {
                    tracing::warn!(chapter_id = %self.chapter_id, page = index + 1, error = %e, "failed to load page");
                    self.page_errors.insert(index);
                }
            }
        }
    }

    fn store_loaded(&mut self, index: usize, bytes: Bytes) {
        if index == self.current_page {
            if self.current_image.is_none() && !self.page_errors.contains(&index) {
                self.current_image = Some(bytes);
            }
        } else if index > self.current_page && index <= self.current_page + self.options.prefetch_ahead {
            self.ready.insert(index, bytes);
        }
    }

    /// Clear the page's error and reload it with a cache-busted URL.
    ///
    /// The error is cleared whether or not it was set.
    pub fn retry_page(&mut self, index: usize) {
        self.page_errors.remove(&index);
        if !self.navigable() || index >= self.pages.len() {
            return;
        }

        self.retry_seq += 1;
        let token = format!("{}-{}", Utc::now().timestamp_millis(), self.retry_seq);
        self.retry_tokens.insert(index, token);
        self.ready.remove(&index);

        if index == self.current_page {
            self.current_image = None;
            self.spawn_load(index, LoadPurpose::Display);
        }
    }

    /// Snapshot the current pages into the offline cache.
    pub async fn request_offline_cache(&mut self) -> CacheOutcome {
        if !self.navigable() {
            return CacheOutcome::Failed;
        }

        let manifest = self.pages.manifest();
        let outcome = self.deps.cache.cache_chapter_outcome(&self.chapter_id, &manifest).await;
        if outcome.is_stored() {
            self.is_cached = true;
        }
        outcome
    }

    /// Show the controls and restart the idle timer.
    pub fn reveal_controls(&mut self) {
        if !self.closed {
            self.controls.reveal();
        }
    }

    /// Leave the reader. Cancels the idle timer and releases page handles.
    pub fn close(&mut self) -> NavTarget {
        let target = match &self.parent {
            Some(parent) => NavTarget::Manga(parent.id.clone()),
            None => NavTarget::Back,
        };

        self.controls.cancel();
        self.generation += 1;
        self.revoke_handles();
        self.current_image = None;
        self.ready.clear();
        self.closed = true;

        tracing::debug!(chapter_id = %self.chapter_id, ?target, "reader closed");
        self.effects.push(Effect::Navigate(target.clone()));
        target
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Apply finished loads and expire the idle timer, without waiting.
    pub fn tick(&mut self) {
        while let Some(joined) = self.loads.try_join_next() {
            self.apply_joined(joined);
        }
        self.controls.expire();
    }

    /// Wait for the next load completion or idle expiry. Returns `false`
    /// when there is nothing to wait for.
    pub async fn next_event(&mut self) -> bool {
        let deadline = self.controls.deadline();

        if self.loads.is_empty() {
            let Some(at) = deadline else {
                return false;
            };
            tokio::time::sleep_until(at).await;
            self.controls.expire();
            return true;
        }

        let joined = match deadline {
            Some(at) => tokio::select! {
                joined = self.loads.join_next() => joined,
                _ = tokio::time::sleep_until(at) => None,
            },
            None => self.loads.join_next().await,
        };

        match joined {
            Some(joined) => self.apply_joined(joined),
            None => {
                self.controls.expire();
            }
        }
        true
    }

    /// Wait for every outstanding load and apply it.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.loads.join_next().await {
            self.apply_joined(joined);
        }
    }

    pub fn view(&self) -> ReaderView {
        let chapter_id = self.chapter_id.clone();
        if self.closed {
            return ReaderView::Closed { chapter_id };
        }

        match &self.phase {
            Phase::Loading => ReaderView::Loading { chapter_id },
            Phase::Failed(message) => ReaderView::Failed { chapter_id, message: message.clone() },
            Phase::Ready if self.pages.is_empty() => ReaderView::NoPages { chapter_id },
            Phase::Ready => {
                let index = self.current_page;
                let status = if self.page_errors.contains(&index) {
                    PageStatus::Error
                } else if self.current_image.is_some() {
                    PageStatus::Loaded
                } else {
                    PageStatus::Loading
                };

                ReaderView::Page(Box::new(PageView {
                    chapter_id,
                    page: index,
                    total_pages: self.pages.len(),
                    file_name: self.pages.file_name(index).unwrap_or_default().to_string(),
                    url: self.pages.url(index).unwrap_or_default().to_string(),
                    status,
                    bytes: self.current_image.as_ref().map(Bytes::len),
                    controls_visible: self.controls.is_visible(),
                    cache_sourced: self.is_cache_sourced(),
                    is_cached: self.is_cached,
                    page_errors: self.page_errors(),
                    prefetched: self.prefetched(),
                    manga: self.parent.clone(),
                    chapter: self.metadata.clone(),
                }))
            }
        }
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.controls.cancel();
        self.revoke_handles();
    }
}

fn sorted(set: &HashSet<usize>) -> Vec<usize> {
    let mut items: Vec<usize> = set.iter().copied().collect();
    items.sort_unstable();
    items
}
