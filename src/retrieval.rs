//! Top-K selection over per-field search results.
//!
//! The index returns one result group per searchable field, so a chunk that
//! matches on both title and content shows up twice. Selection flattens the
//! groups in the order they were returned, keeps the first occurrence of
//! each chunk id and truncates to `top_k`.

use std::collections::HashSet;

use crate::models::{ChunkRecord, ResultGroup};

/// Default number of chunks forwarded to the prompt.
pub const DEFAULT_TOP_K: usize = 5;

/// Flatten, deduplicate by id (first group wins) and truncate to `top_k`.
pub fn select_top_k(groups: Vec<ResultGroup>, top_k: usize) -> Vec<ChunkRecord> {
    let mut seen = HashSet::new();
    groups
        .into_iter()
        .flat_map(|group| group.records)
        .filter(|record| seen.insert(record.id.clone()))
        .take(top_k)
        .collect()
}
