//! Core data models used throughout the bridge.
//!
//! These types represent the pages, chunks, and search results that flow
//! through the indexing and question-answering pipeline.

use serde::Serialize;

/// A notes page selected for indexing. Fetched fresh on every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_id: String,
    pub title: String,
}

/// A chunk of a page's extracted text, the unit of indexing and retrieval.
///
/// Identity is `id`, a deterministic hash of `(page_id, chunk_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub id: String,
    pub content: String,
    pub title: String,
    pub page_id: String,
    pub chunk_index: u64,
}

/// Records matched by a single indexed field, in relevance order.
#[derive(Debug, Clone)]
pub struct ResultGroup {
    pub field: String,
    pub records: Vec<ChunkRecord>,
}
