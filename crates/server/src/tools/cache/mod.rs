//! Offline cache MCP tools.
//!
//! This module provides tools for inspecting and purging the chapter cache.

pub mod purge;
pub mod status;

pub use purge::{CacheRemoveParams, clear_impl, remove_impl};
pub use status::status_impl;
