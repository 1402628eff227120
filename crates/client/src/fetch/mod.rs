//! Page image fetcher.
//!
//! Implements [`ByteFetcher`] for both kinds of page URL a reader can hold:
//!
//! - `blob:` handles resolve through the shared [`ObjectUrlRegistry`]
//! - `http(s)` URLs are fetched with `Accept: image/*`, a timeout and a body
//!   size cap (default 10MB)

pub mod url;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};

pub use url::{UrlError, cache_bust, parse_page_url};

use mangaread_core::cache::{ByteFetcher, ObjectUrlRegistry, is_handle_url};
use mangaread_core::{AppConfig, Error};

/// Configuration for the page fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "mangaread/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 10s)
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "mangaread/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(10000),
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), max_bytes: config.max_page_bytes, timeout: config.timeout() }
    }
}

/// Fetches page bytes from handles or the network.
pub struct PageFetcher {
    http: Client,
    config: FetchConfig,
    handles: Arc<ObjectUrlRegistry>,
}

impl PageFetcher {
    pub fn new(config: FetchConfig, handles: Arc<ObjectUrlRegistry>) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::FetchFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config, handles })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch_remote(&self, url_str: &str) -> Result<Bytes, Error> {
        let start = Instant::now();
        let url = parse_page_url(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "image/*")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(url.to_string())
                } else {
                    Error::FetchFailed(format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {} for {url}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::FetchFailed(format!("failed to read response: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(%url, bytes = bytes.len(), fetch_ms = start.elapsed().as_millis() as u64, "fetched page");
        Ok(bytes)
    }
}

#[async_trait]
impl ByteFetcher for PageFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, Error> {
        if is_handle_url(url) {
            return self
                .handles
                .resolve(url)
                .ok_or_else(|| Error::HandleRevoked(url.to_string()));
        }
        self.fetch_remote(url).await
    }
}
