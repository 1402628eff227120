//! Query parameters for catalog collection endpoints.
//!
//! Each query renders to the upstream's repeated `key[]=value` form and to a
//! stable response-cache key built from its JSON encoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const SEARCH_DEFAULT_LIMIT: u32 = 20;
const SEARCH_MAX_LIMIT: u32 = 100;
const FEED_DEFAULT_LIMIT: u32 = 100;
const FEED_MAX_LIMIT: u32 = 500;
const DEFAULT_LANGUAGE: &str = "en";

/// Manga search filters for `GET /manga`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publication_demographic: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_rating: Vec<String>,
    /// Sort field to `asc` / `desc`, e.g. `followedCount: desc`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub order: BTreeMap<String, String>,
}

impl SearchQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(SEARCH_DEFAULT_LIMIT).clamp(1, SEARCH_MAX_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    pub fn cache_key(&self) -> String {
        format!("search_{}", serde_json::to_string(self).unwrap_or_default())
    }

    /// Upstream query pairs. Results are restricted to English translations
    /// and carry cover art, author and artist relationships.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("limit".to_string(), self.limit().to_string()),
            ("offset".to_string(), self.offset().to_string()),
            ("availableTranslatedLanguage[]".to_string(), DEFAULT_LANGUAGE.to_string()),
        ];
        for include in ["cover_art", "author", "artist"] {
            params.push(("includes[]".to_string(), include.to_string()));
        }
        if let Some(title) = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            params.push(("title".to_string(), title.to_string()));
        }

        let lists = [
            ("includedTags[]", &self.included_tags),
            ("excludedTags[]", &self.excluded_tags),
            ("status[]", &self.status),
            ("publicationDemographic[]", &self.publication_demographic),
            ("contentRating[]", &self.content_rating),
        ];
        for (key, values) in lists {
            params.extend(values.iter().map(|value| (key.to_string(), value.clone())));
        }

        for (field, direction) in &self.order {
            params.push((format!("order[{field}]"), direction.clone()));
        }
        params
    }
}

/// Chapter listing options for `GET /manga/{id}/feed`. Newest chapters first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_language: Option<String>,
}

impl FeedQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(FEED_DEFAULT_LIMIT).clamp(1, FEED_MAX_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    pub fn language(&self) -> &str {
        self.translated_language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn cache_key(&self, manga_id: &str) -> String {
        format!("feed_{manga_id}_{}", serde_json::to_string(self).unwrap_or_default())
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        vec![
            ("limit".to_string(), self.limit().to_string()),
            ("offset".to_string(), self.offset().to_string()),
            ("translatedLanguage[]".to_string(), self.language().to_string()),
            ("includes[]".to_string(), "scanlation_group".to_string()),
            ("order[chapter]".to_string(), "desc".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(params: &[(String, String)], key: &str, value: &str) -> bool {
        params.iter().any(|(k, v)| k == key && v == value)
    }

    #[test]
    fn test_search_defaults() {
        let params = SearchQuery::default().to_params();
        assert!(has(&params, "limit", "20"));
        assert!(has(&params, "offset", "0"));
        assert!(has(&params, "availableTranslatedLanguage[]", "en"));
        assert!(has(&params, "includes[]", "artist"));
        assert!(!params.iter().any(|(k, _)| k == "title"));
    }

    #[test]
    fn test_search_filters_repeat_keys() {
        let query = SearchQuery {
            title: Some("  berserk ".into()),
            limit: Some(500),
            status: vec!["ongoing".into(), "completed".into()],
            content_rating: vec!["safe".into()],
            order: BTreeMap::from([("followedCount".to_string(), "desc".to_string())]),
            ..Default::default()
        };

        let params = query.to_params();
        assert!(has(&params, "title", "berserk"));
        assert!(has(&params, "limit", "100"));
        assert_eq!(params.iter().filter(|(k, _)| k == "status[]").count(), 2);
        assert!(has(&params, "contentRating[]", "safe"));
        assert!(has(&params, "order[followedCount]", "desc"));
    }

    #[test]
    fn test_cache_keys_follow_filters() {
        let plain = SearchQuery::default();
        let titled = SearchQuery { title: Some("berserk".into()), ..Default::default() };
        assert_eq!(plain.cache_key(), "search_{}");
        assert_ne!(plain.cache_key(), titled.cache_key());

        let feed = FeedQuery { offset: Some(100), ..Default::default() };
        assert_eq!(feed.cache_key("m-1"), "feed_m-1_{\"offset\":100}");
    }

    #[test]
    fn test_feed_params() {
        let params = FeedQuery { limit: Some(0), ..Default::default() }.to_params();
        assert!(has(&params, "limit", "1"));
        assert!(has(&params, "translatedLanguage[]", "en"));
        assert!(has(&params, "includes[]", "scanlation_group"));
        assert!(has(&params, "order[chapter]", "desc"));
    }
}
