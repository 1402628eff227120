//! Page URL validation and cache-busting.

use mangaread_core::cache::is_handle_url;

/// Error type for page URL validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse a remote page URL.
///
/// Trims whitespace, requires `http` or `https`, drops any fragment and keeps
/// the query string as given.
pub fn parse_page_url(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
    parsed.set_fragment(None);

    Ok(parsed)
}

/// Append `retry=<token>` so a reload bypasses any negative cache between
/// here and the origin.
///
/// Existing query parameters are preserved. Handle URLs are returned
/// unchanged since they never leave the process.
pub fn cache_bust(url: &str, token: &str) -> String {
    if is_handle_url(url) {
        return url.to_string();
    }

    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().append_pair("retry", token);
            parsed.into()
        }
        Err(_) => {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{url}{separator}retry={token}")
        }
    }
}
