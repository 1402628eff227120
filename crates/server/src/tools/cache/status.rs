//! cache_status tool implementation.
//!
//! Lists cached chapters and their aggregate size.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::{Deserialize, Serialize};

use mangaread_core::ChapterCache;

use crate::tools::json_result;

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatusOutput {
    pub chapter_ids: Vec<String>,
    pub chapter_count: usize,
    pub total_bytes: u64,
    /// Total size in megabytes, two decimal places.
    pub size_mb: String,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(cache: &ChapterCache) -> Result<CallToolResult, McpError> {
    let mut chapter_ids = cache.cached_chapter_ids().await;
    chapter_ids.sort();
    let size = cache.cache_size().await;

    let output = CacheStatusOutput {
        chapter_ids,
        chapter_count: size.chapter_count,
        total_bytes: size.total_bytes,
        size_mb: size.size_mb(),
    };
    json_result(&output)
}
