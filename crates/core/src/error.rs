//! Unified error types for mangaread.
//!
//! Display strings carry a stable code prefix so log lines and tool errors
//! can be grepped by failure class.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error type shared by the store, cache, fetch and reader layers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty chapter id).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Every page fetch of a caching request failed; nothing was stored.
    #[error("CACHE_EMPTY: no page of chapter {0} could be fetched")]
    NothingCached(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be encoded or decoded.
    #[error("CACHE_ERROR: codec: {0}")]
    Codec(String),

    /// A stored chapter failed its consistency check.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Generic transport failure while fetching a single resource.
    #[error("FETCH_FAILED: {0}")]
    FetchFailed(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// A page handle was used after it was revoked.
    #[error("HANDLE_REVOKED: {0}")]
    HandleRevoked(String),

    /// Whole-chapter load failed (metadata or manifest unavailable).
    #[error("MANIFEST_LOAD_FAILED: {0}")]
    ManifestLoad(String),

    /// No reader session is open.
    #[error("NO_SESSION")]
    NoSession,
}

impl Error {
    /// Whether this error originated in the durable store.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::MigrationFailed(_) | Error::Codec(_) | Error::CorruptEntry(_)
        )
    }

    /// Whether this error is an isolated single-resource fetch failure.
    pub fn is_transient_fetch(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl(_)
                | Error::FetchFailed(_)
                | Error::FetchTimeout(_)
                | Error::FetchTooLarge(_)
                | Error::HttpError(_)
                | Error::HandleRevoked(_)
        )
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::NothingCached(id) => (-32003, format!("no page of chapter {id} could be fetched")),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) | Error::Codec(msg) | Error::CorruptEntry(msg) => (-32002, msg.clone()),
            Error::InvalidUrl(msg) => (-32004, msg.clone()),
            Error::FetchFailed(msg) => (-32005, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::HttpError(msg) => (-32008, msg.clone()),
            Error::HandleRevoked(msg) => (-32009, msg.clone()),
            Error::ManifestLoad(msg) => (-32010, msg.clone()),
            Error::NoSession => (-32011, "No reader session is open".to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
