//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MANGAREAD_*)
//! 2. TOML config file (if MANGAREAD_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MANGAREAD_*)
/// 2. TOML config file (if MANGAREAD_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite offline cache database.
    ///
    /// Set via MANGAREAD_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL of the upstream catalog API.
    ///
    /// Set via MANGAREAD_API_BASE_URL environment variable.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bearer token attached to catalog requests, if any.
    ///
    /// Set via MANGAREAD_AUTH_TOKEN environment variable.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via MANGAREAD_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via MANGAREAD_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted for a single page image.
    ///
    /// Set via MANGAREAD_MAX_PAGE_BYTES environment variable.
    #[serde(default = "default_max_page_bytes")]
    pub max_page_bytes: usize,

    /// TTL of the in-memory catalog response cache, in seconds.
    ///
    /// Set via MANGAREAD_CATALOG_TTL_SECS environment variable.
    #[serde(default = "default_catalog_ttl_secs")]
    pub catalog_ttl_secs: u64,

    /// Minimum interval between upstream catalog requests, in milliseconds.
    ///
    /// Set via MANGAREAD_REQUEST_INTERVAL_MS environment variable.
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,

    /// Page image quality: "data" or "dataSaver".
    ///
    /// Set via MANGAREAD_QUALITY environment variable.
    #[serde(default = "default_quality")]
    pub quality: String,

    /// Number of pages prefetched ahead of the current one.
    ///
    /// Set via MANGAREAD_PREFETCH_AHEAD environment variable.
    #[serde(default = "default_prefetch_ahead")]
    pub prefetch_ahead: usize,

    /// Idle delay before reader controls hide, in milliseconds.
    ///
    /// Set via MANGAREAD_IDLE_HIDE_MS environment variable.
    #[serde(default = "default_idle_hide_ms")]
    pub idle_hide_ms: u64,

    /// Maximum concurrent page downloads while caching a chapter.
    ///
    /// Set via MANGAREAD_CACHE_CONCURRENCY environment variable.
    #[serde(default = "default_cache_concurrency")]
    pub cache_concurrency: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mangaread-cache.sqlite")
}

fn default_api_base_url() -> String {
    "https://api.mangadex.org".into()
}

fn default_user_agent() -> String {
    "mangaread/0.1".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_page_bytes() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_catalog_ttl_secs() -> u64 {
    300
}

fn default_request_interval_ms() -> u64 {
    200
}

fn default_quality() -> String {
    "data".into()
}

fn default_prefetch_ahead() -> usize {
    3
}

fn default_idle_hide_ms() -> u64 {
    3_000
}

fn default_cache_concurrency() -> usize {
    6
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            api_base_url: default_api_base_url(),
            auth_token: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_page_bytes: default_max_page_bytes(),
            catalog_ttl_secs: default_catalog_ttl_secs(),
            request_interval_ms: default_request_interval_ms(),
            quality: default_quality(),
            prefetch_ahead: default_prefetch_ahead(),
            idle_hide_ms: default_idle_hide_ms(),
            cache_concurrency: default_cache_concurrency(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn idle_hide(&self) -> Duration {
        Duration::from_millis(self.idle_hide_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MANGAREAD_`
    /// 2. TOML file from `MANGAREAD_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MANGAREAD_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MANGAREAD_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
