//! Manga catalog API client.
//!
//! Talks to the MangaDex REST API with a short-TTL response cache, a fixed
//! request interval and an injected auth token capability.
//!
//! ### Endpoints
//!
//! - `GET /chapter/{id}?includes[]=scanlation_group&includes[]=manga`
//! - `GET /at-home/server/{id}` (page manifest)
//! - `GET /manga/{id}?includes[]=cover_art&includes[]=author&includes[]=artist`
//! - `GET /manga?title=...` (search, see [`SearchQuery`])
//! - `GET /manga/{id}/feed` (chapter listing, see [`FeedQuery`])
//!
//! ### Rate Limiting
//!
//! A minimum interval separates upstream requests (default 200 ms). Cache
//! hits do not count against it. Failed requests are not retried.

pub mod error;
pub mod query;
pub mod response;
pub mod token;
pub mod ttl;

pub use error::CatalogError;
pub use query::{FeedQuery, SearchQuery};
pub use response::{ChapterImages, ChapterMetadata, Listing, MangaDetails};
pub use token::{StaticToken, TokenProvider};
pub use ttl::ResponseCache;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

use mangaread_core::AppConfig;

/// Default base URL of the catalog API.
const DEFAULT_BASE_URL: &str = "https://api.mangadex.org";

/// Page image quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "data")]
    Data,
    #[serde(rename = "dataSaver")]
    DataSaver,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Data => "data",
            Quality::DataSaver => "dataSaver",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(Quality::Data),
            "dataSaver" => Ok(Quality::DataSaver),
            other => Err(CatalogError::Parse(format!("unknown quality: {other}"))),
        }
    }
}

/// Catalog operations consumed by the reader.
#[async_trait]
pub trait ChapterCatalog: Send + Sync {
    async fn chapter_metadata(&self, chapter_id: &str) -> Result<ChapterMetadata, CatalogError>;

    async fn chapter_images(&self, chapter_id: &str, quality: Quality) -> Result<ChapterImages, CatalogError>;

    async fn manga(&self, manga_id: &str) -> Result<MangaDetails, CatalogError>;

    async fn search_manga(&self, query: &SearchQuery) -> Result<Listing<MangaDetails>, CatalogError>;

    async fn manga_feed(&self, manga_id: &str, query: &FeedQuery) -> Result<Listing<ChapterMetadata>, CatalogError>;
}

/// Catalog client configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// TTL of cached responses (default: 300s).
    pub ttl: Duration,
    /// Minimum interval between upstream requests (default: 200ms).
    pub request_interval: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: "mangaread/0.1".to_string(),
            timeout: Duration::from_secs(10),
            ttl: Duration::from_secs(300),
            request_interval: Duration::from_millis(200),
        }
    }
}

impl From<&AppConfig> for CatalogConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            ttl: config.catalog_ttl(),
            request_interval: config.request_interval(),
        }
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Catalog ids are UUID-like; anything else never reaches the URL path.
fn validate_id(id: &str) -> Result<(), CatalogError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(CatalogError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// MangaDex catalog client.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    config: CatalogConfig,
    tokens: Arc<dyn TokenProvider>,
    responses: ResponseCache,
    rate_limiter: Arc<RateLimiter>,
}

impl CatalogClient {
    pub fn new(config: CatalogConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| CatalogError::Network(Arc::new(e)))?;

        Ok(Self {
            http,
            responses: ResponseCache::new(config.ttl),
            rate_limiter: Arc::new(RateLimiter::new(config.request_interval)),
            config,
            tokens,
        })
    }

    /// Create a client from application configuration.
    pub fn from_config(config: &AppConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, CatalogError> {
        Self::new(CatalogConfig::from(config), tokens)
    }

    pub fn responses(&self) -> &ResponseCache {
        &self.responses
    }

    /// Cached body for `cache_key`, or a rate-limited upstream GET.
    async fn get_cached(&self, cache_key: String, path: &str, query: &[(&str, &str)]) -> Result<Value, CatalogError> {
        if let Some(body) = self.responses.get(&cache_key).await {
            tracing::debug!(cache_key, "catalog cache hit");
            return Ok(body);
        }

        self.rate_limiter.acquire().await;

        let url = format!("{}{}", self.config.base_url, path);
        let start = Instant::now();

        let mut request = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .query(query);
        match self.tokens.token().await {
            Some(token) => request = request.bearer_auth(token),
            None => tracing::debug!(path, "anonymous catalog request"),
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(path, status = status.as_u16(), "catalog response");

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(path.to_string()));
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(CatalogError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes).map_err(|e| CatalogError::Parse(e.to_string()))?;

        tracing::debug!(path, elapsed_ms = start.elapsed().as_millis() as u64, "catalog request completed");

        self.responses.insert(cache_key, body.clone()).await;
        Ok(body)
    }
}

#[async_trait]
impl ChapterCatalog for CatalogClient {
    async fn chapter_metadata(&self, chapter_id: &str) -> Result<ChapterMetadata, CatalogError> {
        validate_id(chapter_id)?;
        let body = self
            .get_cached(
                format!("chapter_{chapter_id}"),
                &format!("/chapter/{chapter_id}"),
                &[("includes[]", "scanlation_group"), ("includes[]", "manga")],
            )
            .await?;
        ChapterMetadata::from_body(body)
    }

    async fn chapter_images(&self, chapter_id: &str, quality: Quality) -> Result<ChapterImages, CatalogError> {
        validate_id(chapter_id)?;
        let body = self
            .get_cached(format!("images_{chapter_id}"), &format!("/at-home/server/{chapter_id}"), &[])
            .await?;
        ChapterImages::from_body(body, quality)
    }

    async fn manga(&self, manga_id: &str) -> Result<MangaDetails, CatalogError> {
        validate_id(manga_id)?;
        let body = self
            .get_cached(
                format!("manga_{manga_id}"),
                &format!("/manga/{manga_id}"),
                &[("includes[]", "cover_art"), ("includes[]", "author"), ("includes[]", "artist")],
            )
            .await?;
        MangaDetails::from_body(body)
    }

    async fn search_manga(&self, query: &SearchQuery) -> Result<Listing<MangaDetails>, CatalogError> {
        let params = query.to_params();
        let body = self.get_cached(query.cache_key(), "/manga", &pairs(&params)).await?;
        Listing::from_body(body, MangaDetails::from_entity)
    }

    async fn manga_feed(&self, manga_id: &str, query: &FeedQuery) -> Result<Listing<ChapterMetadata>, CatalogError> {
        validate_id(manga_id)?;
        let params = query.to_params();
        let body = self
            .get_cached(query.cache_key(manga_id), &format!("/manga/{manga_id}/feed"), &pairs(&params))
            .await?;
        Listing::from_body(body, ChapterMetadata::from_entity)
    }
}

fn pairs(params: &[(String, String)]) -> Vec<(&str, &str)> {
    params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}
