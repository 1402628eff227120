//! cache_remove and cache_clear tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use mangaread_core::{ChapterCache, Error};

use crate::tools::json_result;

/// Parameters for the cache_remove tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheRemoveParams {
    /// The chapter whose cached pages should be deleted.
    pub chapter_id: String,
}

/// Output from the cache purge tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePurgeOutput {
    /// Whether the storage operation succeeded. Removing an absent chapter succeeds.
    pub ok: bool,
}

/// Implementation of the cache_remove tool.
pub async fn remove_impl(cache: &ChapterCache, params: CacheRemoveParams) -> Result<CallToolResult, McpError> {
    if params.chapter_id.trim().is_empty() {
        return Err(Error::InvalidInput("chapter_id cannot be empty".to_string()).into());
    }

    let ok = cache.remove_cached_chapter(&params.chapter_id).await;
    json_result(&CachePurgeOutput { ok })
}

/// Implementation of the cache_clear tool.
pub async fn clear_impl(cache: &ChapterCache) -> Result<CallToolResult, McpError> {
    let ok = cache.clear_all_cached_chapters().await;
    json_result(&CachePurgeOutput { ok })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{fixture, output};
    use mangaread_core::ManifestPage;

    fn manifest() -> Vec<ManifestPage> {
        vec![ManifestPage::new("1.png", "https://node.test/1.png")]
    }

    #[tokio::test]
    async fn test_remove_one_chapter() {
        let f = fixture().await;
        let cache = &f.state.deps.cache;
        cache.cache_chapter("ch-1", &manifest()).await;
        cache.cache_chapter("ch-2", &manifest()).await;

        let params = CacheRemoveParams { chapter_id: "ch-1".to_string() };
        let out = output(&remove_impl(cache, params).await.unwrap());

        assert_eq!(out["ok"], true);
        assert!(!cache.is_chapter_cached("ch-1").await);
        assert!(cache.is_chapter_cached("ch-2").await);
    }

    #[tokio::test]
    async fn test_remove_absent_chapter_succeeds() {
        let f = fixture().await;
        let params = CacheRemoveParams { chapter_id: "nope".to_string() };
        let out = output(&remove_impl(&f.state.deps.cache, params).await.unwrap());
        assert_eq!(out["ok"], true);
    }

    #[tokio::test]
    async fn test_remove_blank_id() {
        let f = fixture().await;
        let params = CacheRemoveParams { chapter_id: " ".to_string() };
        assert!(remove_impl(&f.state.deps.cache, params).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let f = fixture().await;
        let cache = &f.state.deps.cache;
        cache.cache_chapter("ch-1", &manifest()).await;
        cache.cache_chapter("ch-2", &manifest()).await;

        let out = output(&clear_impl(cache).await.unwrap());
        assert_eq!(out["ok"], true);
        assert!(cache.cached_chapter_ids().await.is_empty());
    }
}
