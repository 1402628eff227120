//! Reader tools.
//!
//! Each call applies finished page loads and idle expiry before rendering,
//! and drains the session's pending effects into the output.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use mangaread_core::Error;
use mangaread_core::cache::CacheOutcome;
use mangaread_reader::{Action, Effect, InputEvent, MangaRef, NavTarget, ReaderSession, ReaderView};

use crate::state::{AppState, open_session};
use crate::tools::json_result;

/// Parameters for the reader_open tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReaderOpenParams {
    /// The chapter to read.
    pub chapter_id: String,

    /// The manga the chapter was opened from. Closing the reader returns there.
    #[serde(default)]
    pub manga_id: Option<String>,

    #[serde(default)]
    pub manga_title: Option<String>,
}

/// Parameters for the reader_view tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ReaderViewParams {
    /// Wait for outstanding page loads before rendering.
    #[serde(default)]
    pub settle: bool,
}

/// Parameters for the reader_input tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReaderInputParams {
    pub event: InputEvent,
}

/// Parameters for the reader_retry_page tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReaderRetryParams {
    /// Zero-based page index.
    pub page: usize,
}

/// Output shared by the reader tools.
#[derive(Debug, Clone, Serialize)]
pub struct ReaderOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub view: ReaderView,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
}

/// Output from the reader_save_offline tool.
#[derive(Debug, Clone, Serialize)]
pub struct SaveOfflineOutput {
    pub chapter_id: String,
    /// `complete`, `partial` or `failed`.
    pub status: &'static str,
    pub stored: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<String>,
}

/// Output from the reader_close tool.
#[derive(Debug, Clone, Serialize)]
pub struct CloseOutput {
    pub chapter_id: String,
    pub navigate: NavTarget,
}

fn render(session: &mut ReaderSession, action: Option<Action>) -> ReaderOutput {
    session.tick();
    ReaderOutput { action, view: session.view(), effects: session.take_effects() }
}

/// Implementation of the reader_open tool. Replaces any open session.
pub async fn open_impl(state: &AppState, params: ReaderOpenParams) -> Result<CallToolResult, McpError> {
    let chapter_id = params.chapter_id.trim();
    if chapter_id.is_empty() {
        return Err(Error::InvalidInput("chapter_id cannot be empty".into()).into());
    }

    let mut session = ReaderSession::new(chapter_id, state.deps.clone(), state.options.clone());
    if let Some(manga_id) = params.manga_id.filter(|id| !id.trim().is_empty()) {
        session = session.with_parent(MangaRef { id: manga_id, title: params.manga_title });
    }

    let mut slot = state.session().await;
    *slot = None;

    session.load().await;
    let output = render(&mut session, None);
    *slot = Some(session);

    json_result(&output)
}

/// Implementation of the reader_view tool.
pub async fn view_impl(state: &AppState, params: ReaderViewParams) -> Result<CallToolResult, McpError> {
    let mut slot = state.session().await;
    let session = open_session(&mut slot)?;
    if params.settle {
        session.settle().await;
    }
    json_result(&render(session, None))
}

/// Implementation of the reader_input tool. Closing ends the session.
pub async fn input_impl(state: &AppState, params: ReaderInputParams) -> Result<CallToolResult, McpError> {
    let mut slot = state.session().await;
    let session = open_session(&mut slot)?;

    let action = session.dispatch(&params.event);
    let output = render(session, action);
    if action == Some(Action::Close) {
        *slot = None;
    }

    json_result(&output)
}

/// Implementation of the reader_retry_page tool.
pub async fn retry_impl(state: &AppState, params: ReaderRetryParams) -> Result<CallToolResult, McpError> {
    let mut slot = state.session().await;
    let session = open_session(&mut slot)?;

    let count = session.page_count();
    if count > 0 && params.page >= count {
        return Err(Error::InvalidInput(format!("page {} out of range (0..{count})", params.page)).into());
    }

    session.retry_page(params.page);
    json_result(&render(session, None))
}

/// Implementation of the reader_reload tool.
pub async fn reload_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let mut slot = state.session().await;
    let session = open_session(&mut slot)?;
    session.load().await;
    json_result(&render(session, None))
}

/// Implementation of the reader_save_offline tool.
pub async fn save_offline_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let mut slot = state.session().await;
    let session = open_session(&mut slot)?;

    let (status, stored, dropped) = match session.request_offline_cache().await {
        CacheOutcome::Complete { pages } => ("complete", pages, Vec::new()),
        CacheOutcome::Partial { stored, dropped } => ("partial", stored, dropped),
        CacheOutcome::Failed => ("failed", 0, Vec::new()),
    };

    let output = SaveOfflineOutput { chapter_id: session.chapter_id().to_string(), status, stored, dropped };
    json_result(&output)
}

/// Implementation of the reader_close tool.
pub async fn close_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let mut slot = state.session().await;
    let mut session = slot.take().ok_or(Error::NoSession)?;

    let navigate = session.close();
    json_result(&CloseOutput { chapter_id: session.chapter_id().to_string(), navigate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{fixture, output};
    use mangaread_reader::SwipeDirection;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn open_params(chapter_id: &str) -> ReaderOpenParams {
        ReaderOpenParams { chapter_id: chapter_id.into(), manga_id: Some("m-1".into()), manga_title: None }
    }

    #[tokio::test]
    async fn test_open_shows_first_page() {
        let f = fixture().await;
        let result = open_impl(&f.state, open_params("ch-1")).await.unwrap();
        let out = output(&result);

        assert_eq!(out["view"]["state"], "page");
        assert_eq!(out["view"]["page"], 0);
        assert_eq!(out["view"]["total_pages"], 3);
        assert_eq!(out["view"]["controls_visible"], true);
        assert_eq!(out["view"]["manga"]["id"], "m-1");
    }

    #[tokio::test]
    async fn test_open_rejects_blank_chapter() {
        let f = fixture().await;
        let result = open_impl(&f.state, open_params("  ")).await;
        assert!(result.is_err());
        assert!(f.state.session().await.is_none());
    }

    #[tokio::test]
    async fn test_open_failure_reports_failed_view() {
        let f = fixture().await;
        f.catalog.down.store(true, Ordering::SeqCst);

        let out = output(&open_impl(&f.state, open_params("ch-1")).await.unwrap());
        assert_eq!(out["view"]["state"], "failed");

        f.catalog.down.store(false, Ordering::SeqCst);
        let out = output(&reload_impl(&f.state).await.unwrap());
        assert_eq!(out["view"]["state"], "page");
    }

    #[tokio::test]
    async fn test_tools_require_session() {
        let f = fixture().await;
        assert!(view_impl(&f.state, ReaderViewParams::default()).await.is_err());
        assert!(reload_impl(&f.state).await.is_err());
        assert!(save_offline_impl(&f.state).await.is_err());
        assert!(close_impl(&f.state).await.is_err());

        let params = ReaderInputParams { event: InputEvent::PointerMove };
        let err = input_impl(&f.state, params).await.unwrap_err();
        assert_eq!(err.code.0, -32011);
    }

    #[tokio::test]
    async fn test_input_advances_and_scrolls() {
        let f = fixture().await;
        open_impl(&f.state, open_params("ch-1")).await.unwrap();

        let params = ReaderInputParams { event: InputEvent::Swipe { direction: SwipeDirection::Left } };
        let out = output(&input_impl(&f.state, params).await.unwrap());

        assert_eq!(out["action"], "advance");
        assert_eq!(out["view"]["page"], 1);
        assert_eq!(out["effects"], json!([{"effect": "scroll_to_top"}]));
    }

    #[tokio::test]
    async fn test_unbound_key_takes_no_action() {
        let f = fixture().await;
        open_impl(&f.state, open_params("ch-1")).await.unwrap();

        let params = ReaderInputParams { event: InputEvent::Key { key: "q".into() } };
        let out = output(&input_impl(&f.state, params).await.unwrap());
        assert!(out.get("action").is_none());
        assert_eq!(out["view"]["page"], 0);
    }

    #[tokio::test]
    async fn test_escape_ends_session() {
        let f = fixture().await;
        open_impl(&f.state, open_params("ch-1")).await.unwrap();

        let params = ReaderInputParams { event: InputEvent::Key { key: "Escape".into() } };
        let out = output(&input_impl(&f.state, params).await.unwrap());

        assert_eq!(out["view"]["state"], "closed");
        assert_eq!(out["effects"], json!([{"effect": "navigate", "to": "manga", "manga_id": "m-1"}]));
        assert!(f.state.session().await.is_none());
    }

    #[tokio::test]
    async fn test_settled_view_has_page_bytes() {
        let f = fixture().await;
        open_impl(&f.state, open_params("ch-1")).await.unwrap();

        let out = output(&view_impl(&f.state, ReaderViewParams { settle: true }).await.unwrap());
        assert_eq!(out["view"]["status"], "loaded");
        assert_eq!(out["view"]["prefetched"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_retry_rejects_out_of_range() {
        let f = fixture().await;
        open_impl(&f.state, open_params("ch-1")).await.unwrap();

        assert!(retry_impl(&f.state, ReaderRetryParams { page: 3 }).await.is_err());
        assert!(retry_impl(&f.state, ReaderRetryParams { page: 2 }).await.is_ok());
    }

    #[tokio::test]
    async fn test_save_offline_then_reopen_from_cache() {
        let f = fixture().await;
        open_impl(&f.state, open_params("ch-1")).await.unwrap();

        let out = output(&save_offline_impl(&f.state).await.unwrap());
        assert_eq!(out["status"], "complete");
        assert_eq!(out["stored"], 3);

        f.catalog.down.store(true, Ordering::SeqCst);
        let out = output(&open_impl(&f.state, open_params("ch-1")).await.unwrap());
        assert_eq!(out["view"]["state"], "page");
        assert_eq!(out["view"]["cache_sourced"], true);
        assert!(out["view"]["url"].as_str().unwrap().starts_with("blob:"));
    }

    #[tokio::test]
    async fn test_close_without_parent_goes_back() {
        let f = fixture().await;
        let params = ReaderOpenParams { chapter_id: "ch-1".into(), manga_id: None, manga_title: None };
        open_impl(&f.state, params).await.unwrap();

        let out = output(&close_impl(&f.state).await.unwrap());
        assert_eq!(out["navigate"], json!({"to": "back"}));
        assert!(f.state.session().await.is_none());
    }
}
