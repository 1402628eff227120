//! Auth token capability for outbound catalog requests.

use async_trait::async_trait;

/// Supplies the bearer token attached to catalog requests.
///
/// Passed to [`super::CatalogClient`] at construction; `None` means the
/// request goes out anonymously.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Option<String>;
}

/// A fixed token, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    /// Blank tokens are treated as absent.
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        assert_eq!(StaticToken::new(Some("abc".into())).token().await.as_deref(), Some("abc"));
        assert!(StaticToken::new(Some("  ".into())).token().await.is_none());
        assert!(StaticToken::anonymous().token().await.is_none());
    }
}
