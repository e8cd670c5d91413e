//! Fixed-window text chunker.
//!
//! Splits extracted page text into overlapping windows of `size` characters.
//! Each window starts `size - overlap` characters after the previous one, so
//! every character of the input is covered by at least one chunk.
//!
//! Offsets count Unicode scalar values, not bytes. Windows are trimmed of
//! surrounding whitespace; windows that are empty after trimming are dropped
//! and the remaining chunks are numbered contiguously from 0.
//!
//! Each chunk is identified by [`chunk_id`], a SHA-256 of the page id and
//! chunk index, so re-indexing a page reproduces the same ids.

use sha2::{Digest, Sha256};

use crate::models::ChunkRecord;

/// Split `text` into overlapping windows of `size` characters.
///
/// `overlap` must be smaller than `size`; configuration validation enforces
/// this, and a degenerate step is clamped to one character here.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    let step = size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset < chars.len() {
        let end = (offset + size).min(chars.len());
        let window: String = chars[offset..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        offset += step;
    }
    chunks
}

/// Deterministic chunk identity for `(page_id, chunk_index)`.
pub fn chunk_id(page_id: &str, chunk_index: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(page_id.as_bytes());
    hasher.update(b":");
    hasher.update(chunk_index.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Chunk a page's text and wrap each window into a [`ChunkRecord`].
pub fn chunk_page(
    page_id: &str,
    title: &str,
    text: &str,
    size: usize,
    overlap: usize,
) -> Vec<ChunkRecord> {
    chunk_text(text, size, overlap)
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            let chunk_index = i as u64;
            ChunkRecord {
                id: chunk_id(page_id, chunk_index),
                content,
                title: title.to_string(),
                page_id: page_id.to_string(),
                chunk_index,
            }
        })
        .collect()
}
