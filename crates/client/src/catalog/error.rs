//! Catalog client error types.

use std::sync::Arc;

/// Errors from the upstream catalog API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    /// Identifier is empty or contains characters outside `[A-Za-z0-9-]`.
    #[error("invalid id: {0:?}")]
    InvalidId(String),

    /// The catalog has no entity with this id.
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { CatalogError::Timeout } else { CatalogError::Network(Arc::new(err)) }
    }
}

impl From<CatalogError> for mangaread_core::Error {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidId(id) => mangaread_core::Error::InvalidInput(format!("invalid id: {id:?}")),
            other => mangaread_core::Error::ManifestLoad(other.to_string()),
        }
    }
}
