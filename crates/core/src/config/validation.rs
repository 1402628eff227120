//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_page_bytes` is 0 or exceeds 50MB
    /// - `user_agent` or `api_base_url` is empty
    /// - `quality` is not "data" or "dataSaver"
    /// - `prefetch_ahead` exceeds 10
    /// - `idle_hide_ms` is below 500ms
    /// - `cache_concurrency` is 0 or exceeds 16
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_page_bytes == 0 {
            return Err(invalid("max_page_bytes", "must be greater than 0"));
        }
        if self.max_page_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_page_bytes", "must not exceed 50MB"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(invalid("api_base_url", "must not be empty"));
        }

        if self.quality != "data" && self.quality != "dataSaver" {
            return Err(invalid("quality", "must be \"data\" or \"dataSaver\""));
        }

        if self.prefetch_ahead > 10 {
            return Err(invalid("prefetch_ahead", "must not exceed 10"));
        }

        if self.idle_hide_ms < 500 {
            return Err(invalid("idle_hide_ms", "must be at least 500ms"));
        }

        if self.cache_concurrency == 0 || self.cache_concurrency > 16 {
            return Err(invalid("cache_concurrency", "must be between 1 and 16"));
        }

        if self.auth_token.as_deref().is_some_and(str::is_empty) {
            tracing::warn!("auth_token is set but empty; catalog requests will be sent anonymously");
        }

        Ok(())
    }
}
