//! Client code for mangaread.
//!
//! This crate provides the manga catalog API client and the page image
//! fetcher shared by the reader and the server.

pub mod catalog;
pub mod fetch;

#[cfg(test)]
mod test_server;

pub use catalog::{
    CatalogClient, CatalogConfig, CatalogError, ChapterCatalog, ChapterImages, ChapterMetadata, FeedQuery, Listing,
    MangaDetails, Quality, SearchQuery, StaticToken, TokenProvider,
};
pub use fetch::{FetchConfig, PageFetcher, cache_bust};
