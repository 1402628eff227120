//! Upstream response shapes and their normalized forms.
//!
//! Normalization follows the catalog proxy's contract: entity attributes are
//! flattened next to `id`, and related entities (scanlation group, parent
//! manga, cover art, author, artist) are resolved from `relationships`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{CatalogError, Quality};
use mangaread_core::ManifestPage;

/// Base URL of cover art uploads.
pub const COVER_BASE_URL: &str = "https://uploads.mangadex.org/covers";

const UNKNOWN: &str = "Unknown";

/// Raw `{ "data": entity }` envelope.
#[derive(Debug, Deserialize)]
pub struct EntityEnvelope {
    pub data: Entity,
}

/// Raw `{ "data": [entity], limit, offset, total }` collection.
#[derive(Debug, Deserialize)]
pub struct CollectionEnvelope {
    pub data: Vec<Entity>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub total: u32,
}

/// Raw catalog entity.
#[derive(Debug, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
pub struct Relationship {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
}

impl Entity {
    fn related(&self, kind: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|rel| rel.kind == kind)
    }

    fn related_attr(&self, kind: &str, attr: &str) -> Option<String> {
        self.related(kind)?
            .attributes
            .as_ref()?
            .get(attr)?
            .as_str()
            .map(str::to_string)
    }

    /// `{id, ...attributes}` plus the given resolved fields.
    fn flatten(self, resolved: impl IntoIterator<Item = (&'static str, Value)>) -> Value {
        let mut object = self.attributes;
        object.insert("id".into(), Value::String(self.id));
        for (key, value) in resolved {
            object.insert(key.into(), value);
        }
        Value::Object(object)
    }
}

/// Raw `/at-home/server/{id}` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeResponse {
    pub base_url: String,
    pub chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeChapter {
    pub hash: String,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub data_saver: Vec<String>,
}

/// Chapter descriptive metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterMetadata {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub pages: Option<u32>,
    #[serde(default)]
    pub translated_language: Option<String>,
    pub scanlation_group: String,
    #[serde(default)]
    pub manga_id: Option<String>,
    /// Remaining upstream attributes, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChapterMetadata {
    pub fn from_body(body: Value) -> Result<Self, CatalogError> {
        let envelope: EntityEnvelope = parse(body)?;
        Self::from_entity(envelope.data)
    }

    pub fn from_entity(chapter: Entity) -> Result<Self, CatalogError> {
        let scanlation_group = chapter
            .related_attr("scanlation_group", "name")
            .unwrap_or_else(|| UNKNOWN.to_string());
        let manga_id = chapter.related("manga").map(|rel| Value::String(rel.id.clone())).unwrap_or(Value::Null);

        parse(chapter.flatten([("scanlationGroup", Value::String(scanlation_group)), ("mangaId", manga_id)]))
    }

    /// Short human label, e.g. `Vol. 3 Ch. 21 - Title`.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(volume) = &self.volume {
            parts.push(format!("Vol. {volume}"));
        }
        if let Some(chapter) = &self.chapter {
            parts.push(format!("Ch. {chapter}"));
        }
        let mut label = parts.join(" ");
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            if label.is_empty() {
                label = title.to_string();
            } else {
                label = format!("{label} - {title}");
            }
        }
        label
    }
}

/// Page-URL manifest for one chapter at one quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterImages {
    pub base_url: String,
    pub hash: String,
    pub images: Vec<ManifestPage>,
    pub total_pages: usize,
}

impl ChapterImages {
    pub fn from_body(body: Value, quality: Quality) -> Result<Self, CatalogError> {
        let raw: AtHomeResponse = parse(body)?;
        let files = match quality {
            Quality::Data => raw.chapter.data,
            Quality::DataSaver => raw.chapter.data_saver,
        };

        let images: Vec<ManifestPage> = files
            .into_iter()
            .map(|file_name| {
                let url = format!("{}/{}/{}/{}", raw.base_url, quality.as_str(), raw.chapter.hash, file_name);
                ManifestPage::new(file_name, url)
            })
            .collect();

        Ok(Self { base_url: raw.base_url, hash: raw.chapter.hash, total_pages: images.len(), images })
    }
}

/// Manga details with resolved cover, author and artist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaDetails {
    pub id: String,
    #[serde(default)]
    pub title: BTreeMap<String, String>,
    #[serde(default)]
    pub description: BTreeMap<String, String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub cover_url: Option<String>,
    pub author: String,
    pub artist: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MangaDetails {
    pub fn from_body(body: Value) -> Result<Self, CatalogError> {
        let envelope: EntityEnvelope = parse(body)?;
        Self::from_entity(envelope.data)
    }

    pub fn from_entity(manga: Entity) -> Result<Self, CatalogError> {
        let cover_url = manga
            .related_attr("cover_art", "fileName")
            .map(|file_name| Value::String(cover_url(&manga.id, &file_name)))
            .unwrap_or(Value::Null);
        let author = manga.related_attr("author", "name").unwrap_or_else(|| UNKNOWN.to_string());
        let artist = manga.related_attr("artist", "name").unwrap_or_else(|| UNKNOWN.to_string());

        parse(manga.flatten([
            ("coverUrl", cover_url),
            ("author", Value::String(author)),
            ("artist", Value::String(artist)),
        ]))
    }

    /// English title, else any title, else the id.
    pub fn display_title(&self) -> &str {
        self.title
            .get("en")
            .or_else(|| self.title.values().next())
            .map(String::as_str)
            .unwrap_or(&self.id)
    }
}

/// One page of a catalog collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing<T> {
    pub data: Vec<T>,
    pub limit: u32,
    pub offset: u32,
    pub total: u32,
}

impl<T> Listing<T> {
    /// Normalize every entity of a collection body. One malformed entity fails the page.
    pub fn from_body(body: Value, normalize: impl Fn(Entity) -> Result<T, CatalogError>) -> Result<Self, CatalogError> {
        let raw: CollectionEnvelope = parse(body)?;
        let data = raw.data.into_iter().map(normalize).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { data, limit: raw.limit, offset: raw.offset, total: raw.total })
    }
}

pub fn cover_url(manga_id: &str, file_name: &str) -> String {
    format!("{COVER_BASE_URL}/{manga_id}/{file_name}")
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, CatalogError> {
    serde_json::from_value(value).map_err(|e| CatalogError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chapter_body() -> Value {
        json!({
            "result": "ok",
            "data": {
                "id": "ch-1",
                "type": "chapter",
                "attributes": {
                    "title": "The Black Swordsman",
                    "volume": "1",
                    "chapter": "1",
                    "pages": 3,
                    "translatedLanguage": "en",
                    "publishAt": "2020-01-01T00:00:00+00:00"
                },
                "relationships": [
                    {"id": "g-1", "type": "scanlation_group", "attributes": {"name": "Band of the Hawk"}},
                    {"id": "m-1", "type": "manga"}
                ]
            }
        })
    }

    #[test]
    fn test_chapter_metadata_flattens_attributes() {
        let meta = ChapterMetadata::from_body(chapter_body()).unwrap();
        assert_eq!(meta.id, "ch-1");
        assert_eq!(meta.title.as_deref(), Some("The Black Swordsman"));
        assert_eq!(meta.pages, Some(3));
        assert_eq!(meta.scanlation_group, "Band of the Hawk");
        assert_eq!(meta.manga_id.as_deref(), Some("m-1"));
        assert_eq!(meta.extra["publishAt"], "2020-01-01T00:00:00+00:00");
        assert_eq!(meta.label(), "Vol. 1 Ch. 1 - The Black Swordsman");
    }

    #[test]
    fn test_chapter_metadata_defaults() {
        let body = json!({"data": {"id": "ch-2", "attributes": {"chapter": "5"}, "relationships": []}});
        let meta = ChapterMetadata::from_body(body).unwrap();
        assert_eq!(meta.scanlation_group, "Unknown");
        assert!(meta.manga_id.is_none());
        assert_eq!(meta.label(), "Ch. 5");
    }

    #[test]
    fn test_chapter_images_urls() {
        let body = json!({
            "result": "ok",
            "baseUrl": "https://node.test",
            "chapter": {"hash": "abc", "data": ["1.png", "2.png"], "dataSaver": ["1.jpg"]}
        });

        let images = ChapterImages::from_body(body.clone(), Quality::Data).unwrap();
        assert_eq!(images.total_pages, 2);
        assert_eq!(images.images[1].url, "https://node.test/data/abc/2.png");
        assert_eq!(images.images[1].file_name, "2.png");

        let saver = ChapterImages::from_body(body, Quality::DataSaver).unwrap();
        assert_eq!(saver.total_pages, 1);
        assert_eq!(saver.images[0].url, "https://node.test/dataSaver/abc/1.jpg");
    }

    #[test]
    fn test_manga_details_resolves_relationships() {
        let body = json!({
            "data": {
                "id": "m-1",
                "attributes": {
                    "title": {"en": "Berserk"},
                    "description": {"en": "Dark fantasy"},
                    "status": "ongoing",
                    "year": 1989,
                    "contentRating": "suggestive"
                },
                "relationships": [
                    {"id": "c-1", "type": "cover_art", "attributes": {"fileName": "cover.jpg"}},
                    {"id": "a-1", "type": "author", "attributes": {"name": "Miura Kentaro"}}
                ]
            }
        });

        let details = MangaDetails::from_body(body).unwrap();
        assert_eq!(details.display_title(), "Berserk");
        assert_eq!(details.cover_url.as_deref(), Some("https://uploads.mangadex.org/covers/m-1/cover.jpg"));
        assert_eq!(details.author, "Miura Kentaro");
        assert_eq!(details.artist, "Unknown");
        assert_eq!(details.extra["contentRating"], "suggestive");
    }

    #[test]
    fn test_search_listing_normalizes_each_entity() {
        let body = json!({
            "result": "ok",
            "response": "collection",
            "data": [
                {
                    "id": "m-1",
                    "attributes": {"title": {"en": "Berserk"}},
                    "relationships": [{"id": "c-1", "type": "cover_art", "attributes": {"fileName": "b.jpg"}}]
                },
                {"id": "m-2", "attributes": {"title": {"ja": "Vagabond"}}, "relationships": []}
            ],
            "limit": 2,
            "offset": 10,
            "total": 57
        });

        let listing = Listing::from_body(body, MangaDetails::from_entity).unwrap();
        assert_eq!((listing.limit, listing.offset, listing.total), (2, 10, 57));
        assert_eq!(listing.data[0].cover_url.as_deref(), Some("https://uploads.mangadex.org/covers/m-1/b.jpg"));
        assert_eq!(listing.data[1].display_title(), "Vagabond");
        assert_eq!(listing.data[1].author, "Unknown");
    }

    #[test]
    fn test_feed_listing_resolves_groups() {
        let body = json!({
            "data": [
                {
                    "id": "ch-2",
                    "attributes": {"chapter": "2", "volume": "1"},
                    "relationships": [{"id": "g-1", "type": "scanlation_group", "attributes": {"name": "Hawk"}}]
                },
                {"id": "ch-1", "attributes": {"chapter": "1", "title": "Start"}, "relationships": []}
            ],
            "limit": 100,
            "offset": 0,
            "total": 2
        });

        let listing = Listing::from_body(body, ChapterMetadata::from_entity).unwrap();
        assert_eq!(listing.data[0].scanlation_group, "Hawk");
        assert_eq!(listing.data[0].label(), "Vol. 1 Ch. 2");
        assert_eq!(listing.data[1].scanlation_group, "Unknown");
        assert_eq!(listing.data[1].label(), "Ch. 1 - Start");
    }

    #[test]
    fn test_malformed_body_is_parse_error() {
        let err = ChapterImages::from_body(json!({"result": "error"}), Quality::Data).unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }
}
