//! Manga catalog tools.
//!
//! manga_details fetches manga details from the catalog and keeps a copy in
//! the metadata cache. When the catalog is unreachable the cached copy is
//! served instead. manga_search and manga_chapters browse the catalog and
//! have no offline fallback.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use mangaread_client::{ChapterMetadata, FeedQuery, MangaDetails, SearchQuery};
use mangaread_core::Error;

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the manga_details tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MangaDetailsParams {
    pub manga_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailsSource {
    Network,
    Cache,
}

/// Output from the manga_details tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaDetailsOutput {
    pub source: DetailsSource,
    pub title: String,
    /// When the served copy was cached. Absent for network results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    pub details: MangaDetails,
}

/// Parameters for the manga_search tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MangaSearchParams {
    /// Title substring to match.
    #[serde(default)]
    pub title: Option<String>,

    /// Results per page (default: 20, max: 100).
    #[serde(default)]
    pub limit: Option<u32>,

    #[serde(default)]
    pub offset: Option<u32>,

    /// Tag ids every result must carry.
    #[serde(default)]
    pub included_tags: Vec<String>,

    /// Tag ids no result may carry.
    #[serde(default)]
    pub excluded_tags: Vec<String>,

    /// Publication status: ongoing, completed, hiatus, cancelled.
    #[serde(default)]
    pub status: Vec<String>,

    /// shounen, shoujo, josei, seinen.
    #[serde(default)]
    pub publication_demographic: Vec<String>,

    /// safe, suggestive, erotica, pornographic.
    #[serde(default)]
    pub content_rating: Vec<String>,

    /// Sort field to direction, e.g. {"followedCount": "desc"}.
    #[serde(default)]
    pub order: BTreeMap<String, String>,
}

impl MangaSearchParams {
    fn into_query(self) -> Result<SearchQuery, Error> {
        if let Some((field, direction)) = self.order.iter().find(|(_, d)| !matches!(d.as_str(), "asc" | "desc")) {
            return Err(Error::InvalidInput(format!("order for {field} must be asc or desc, got {direction}")));
        }
        Ok(SearchQuery {
            title: self.title,
            limit: self.limit,
            offset: self.offset,
            included_tags: self.included_tags,
            excluded_tags: self.excluded_tags,
            status: self.status,
            publication_demographic: self.publication_demographic,
            content_rating: self.content_rating,
            order: self.order,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl From<MangaDetails> for MangaSummary {
    fn from(details: MangaDetails) -> Self {
        Self {
            title: details.display_title().to_string(),
            id: details.id,
            author: details.author,
            artist: details.artist,
            status: details.status,
            year: details.year,
            cover_url: details.cover_url,
        }
    }
}

/// Output from the manga_search tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaSearchOutput {
    pub results: Vec<MangaSummary>,
    pub limit: u32,
    pub offset: u32,
    pub total: u32,
}

/// Parameters for the manga_chapters tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MangaChaptersParams {
    pub manga_id: String,

    /// Chapters per page (default: 100, max: 500).
    #[serde(default)]
    pub limit: Option<u32>,

    #[serde(default)]
    pub offset: Option<u32>,

    /// Translation language code (default: en).
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterEntry {
    pub id: String,
    /// e.g. `Vol. 3 Ch. 21 - Title`.
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    pub scanlation_group: String,
    /// Saved for offline reading.
    pub cached: bool,
}

impl ChapterEntry {
    fn new(meta: ChapterMetadata, cached: &HashSet<String>) -> Self {
        Self {
            label: meta.label(),
            cached: cached.contains(&meta.id),
            id: meta.id,
            chapter: meta.chapter,
            pages: meta.pages,
            scanlation_group: meta.scanlation_group,
        }
    }
}

/// Output from the manga_chapters tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaChaptersOutput {
    pub manga_id: String,
    pub chapters: Vec<ChapterEntry>,
    pub limit: u32,
    pub offset: u32,
    pub total: u32,
}

/// Implementation of the manga_search tool.
pub async fn search_impl(state: &AppState, params: MangaSearchParams) -> Result<CallToolResult, McpError> {
    let query = params.into_query()?;
    let listing = state.deps.catalog.search_manga(&query).await.map_err(Error::from)?;
    tracing::debug!(total = listing.total, returned = listing.data.len(), "manga search completed");

    let output = MangaSearchOutput {
        results: listing.data.into_iter().map(MangaSummary::from).collect(),
        limit: listing.limit,
        offset: listing.offset,
        total: listing.total,
    };
    json_result(&output)
}

/// Implementation of the manga_chapters tool.
pub async fn chapters_impl(state: &AppState, params: MangaChaptersParams) -> Result<CallToolResult, McpError> {
    let manga_id = params.manga_id.trim();
    if manga_id.is_empty() {
        return Err(Error::InvalidInput("manga_id cannot be empty".to_string()).into());
    }

    let query = FeedQuery { limit: params.limit, offset: params.offset, translated_language: params.language };
    let listing = state.deps.catalog.manga_feed(manga_id, &query).await.map_err(Error::from)?;
    let cached: HashSet<String> = state.deps.cache.cached_chapter_ids().await.into_iter().collect();

    let output = MangaChaptersOutput {
        manga_id: manga_id.to_string(),
        chapters: listing.data.into_iter().map(|meta| ChapterEntry::new(meta, &cached)).collect(),
        limit: listing.limit,
        offset: listing.offset,
        total: listing.total,
    };
    json_result(&output)
}

/// Implementation of the manga_details tool.
pub async fn details_impl(state: &AppState, params: MangaDetailsParams) -> Result<CallToolResult, McpError> {
    let manga_id = params.manga_id.trim();
    if manga_id.is_empty() {
        return Err(Error::InvalidInput("manga_id cannot be empty".to_string()).into());
    }

    let output = match state.deps.catalog.manga(manga_id).await {
        Ok(details) => {
            state.metadata.cache_manga_metadata(manga_id, &details).await;
            MangaDetailsOutput {
                source: DetailsSource::Network,
                title: details.display_title().to_string(),
                cached_at: None,
                details,
            }
        }
        Err(e) => match state.metadata.get_cached_manga_metadata::<MangaDetails>(manga_id).await {
            Some(cached) => {
                tracing::info!(manga_id, error = %e, "catalog unavailable, serving cached manga details");
                MangaDetailsOutput {
                    source: DetailsSource::Cache,
                    title: cached.data.display_title().to_string(),
                    cached_at: Some(cached.cached_at),
                    details: cached.data,
                }
            }
            None => return Err(Error::from(e).into()),
        },
    };

    json_result(&output)
}
