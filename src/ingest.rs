//! Indexing pipeline orchestration.
//!
//! Coordinates the rebuild flow: notes service → text extraction → title
//! lookup → chunking → index. Pages are processed sequentially. A page that
//! fails to extract is logged and skipped; the rest of the batch carries on.
//! A page with no extractable text produces no chunks and no warning.
//!
//! Collection ([`collect_chunks`]) is separate from applying the result to
//! the index ([`apply_to_index`]) so the caller can fetch pages without
//! holding the index write lock.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::chunk::chunk_page;
use crate::config::{ChunkingConfig, RebuildMode};
use crate::connector_notion::{extract_text, fetch_title, NotesSource};
use crate::error::BridgeError;
use crate::index::ChunkIndex;
use crate::models::{ChunkRecord, Page};

/// What happened to one page during a rebuild.
#[derive(Debug)]
pub enum PageOutcome {
    Indexed {
        page: Page,
        chunks: usize,
        title_defaulted: bool,
        skipped_blocks: usize,
    },
    /// No recognised blocks with text. Silently absent from the index.
    Empty { page_id: String },
    Failed { page_id: String, error: BridgeError },
}

impl PageOutcome {
    pub fn page_id(&self) -> &str {
        match self {
            PageOutcome::Indexed { page, .. } => &page.page_id,
            PageOutcome::Empty { page_id } | PageOutcome::Failed { page_id, .. } => page_id,
        }
    }
}

/// Summary of a completed rebuild.
#[derive(Debug)]
pub struct IndexReport {
    pub mode: RebuildMode,
    pub requested: usize,
    pub chunks: usize,
    pub outcomes: Vec<PageOutcome>,
    pub finished_at: DateTime<Utc>,
}

impl IndexReport {
    pub fn indexed_pages(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PageOutcome::Indexed { .. }))
            .count()
    }

    pub fn failed_pages(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PageOutcome::Failed { .. }))
            .count()
    }

    /// Ids of the pages that failed to extract, in request order.
    pub fn failed_page_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PageOutcome::Failed { .. }))
            .map(PageOutcome::page_id)
            .collect()
    }
}

/// Extract, title and chunk a single page.
pub async fn process_page(
    source: &dyn NotesSource,
    page_id: &str,
    chunking: &ChunkingConfig,
) -> (Vec<ChunkRecord>, PageOutcome) {
    let text = match extract_text(source, page_id).await {
        Ok(text) => text,
        Err(e) => {
            let error = BridgeError::Extraction {
                page_id: page_id.to_string(),
                source: e,
            };
            warn!(page_id, error = %error, "skipping page");
            return (
                Vec::new(),
                PageOutcome::Failed {
                    page_id: page_id.to_string(),
                    error,
                },
            );
        }
    };

    if text.is_empty() {
        debug!(page_id, "page has no extractable text");
        return (
            Vec::new(),
            PageOutcome::Empty {
                page_id: page_id.to_string(),
            },
        );
    }

    let lookup = fetch_title(source, page_id).await;
    let title_defaulted = lookup.is_defaulted();
    let title = lookup.into_title();

    let records = chunk_page(page_id, &title, &text.text, chunking.size, chunking.overlap);
    let outcome = PageOutcome::Indexed {
        page: Page {
            page_id: page_id.to_string(),
            title,
        },
        chunks: records.len(),
        title_defaulted,
        skipped_blocks: text.skipped.len(),
    };
    (records, outcome)
}

/// Process every page in order, isolating per-page failures.
pub async fn collect_chunks(
    source: &dyn NotesSource,
    page_ids: &[String],
    chunking: &ChunkingConfig,
) -> (Vec<ChunkRecord>, Vec<PageOutcome>) {
    let mut records = Vec::new();
    let mut outcomes = Vec::with_capacity(page_ids.len());

    for page_id in page_ids {
        let (page_records, outcome) = process_page(source, page_id, chunking).await;
        records.extend(page_records);
        outcomes.push(outcome);
    }

    (records, outcomes)
}

/// Write collected chunks into the index and commit.
///
/// [`RebuildMode::Full`] clears the index first, so afterwards it holds
/// exactly `records`. [`RebuildMode::Upsert`] only replaces the chunks of
/// `page_ids`.
pub fn apply_to_index(
    index: &mut ChunkIndex,
    mode: RebuildMode,
    page_ids: &[String],
    records: &[ChunkRecord],
) -> Result<()> {
    match mode {
        RebuildMode::Full => index.clear()?,
        RebuildMode::Upsert => {
            for page_id in page_ids {
                index.remove_page(page_id)?;
            }
        }
    }
    for record in records {
        index.add(record)?;
    }
    index.commit()
}

/// Apply collected chunks to the index, then build and log the report.
pub fn finish_rebuild(
    index: &mut ChunkIndex,
    mode: RebuildMode,
    page_ids: &[String],
    records: &[ChunkRecord],
    outcomes: Vec<PageOutcome>,
) -> Result<IndexReport> {
    apply_to_index(index, mode, page_ids, records)?;
    let report = IndexReport {
        mode,
        requested: page_ids.len(),
        chunks: records.len(),
        outcomes,
        finished_at: Utc::now(),
    };
    log_report(&report);
    Ok(report)
}

/// Rebuild `index` from `page_ids` in one call.
pub async fn index_pages(
    source: &dyn NotesSource,
    index: &mut ChunkIndex,
    page_ids: &[String],
    chunking: &ChunkingConfig,
    mode: RebuildMode,
) -> Result<IndexReport> {
    let (records, outcomes) = collect_chunks(source, page_ids, chunking).await;
    finish_rebuild(index, mode, page_ids, &records, outcomes)
}

fn log_report(report: &IndexReport) {
    let failed = report.failed_page_ids();
    if failed.is_empty() {
        info!(
            mode = ?report.mode,
            requested = report.requested,
            indexed = report.indexed_pages(),
            chunks = report.chunks,
            "index rebuilt"
        );
    } else {
        warn!(
            mode = ?report.mode,
            requested = report.requested,
            indexed = report.indexed_pages(),
            chunks = report.chunks,
            failed = ?failed,
            "index rebuilt with failed pages"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector_notion::BlockPage;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeNotes {
        pages: HashMap<String, (Option<String>, Vec<Value>)>,
    }

    impl FakeNotes {
        fn page(mut self, id: &str, title: Option<&str>, paragraphs: &[&str]) -> Self {
            let blocks = paragraphs
                .iter()
                .map(|p| json!({ "type": "paragraph", "paragraph": { "rich_text": [{ "plain_text": p }] } }))
                .collect();
            self.pages
                .insert(id.to_string(), (title.map(str::to_string), blocks));
            self
        }
    }

    #[async_trait]
    impl NotesSource for FakeNotes {
        async fn list_block_children(
            &self,
            block_id: &str,
            _start_cursor: Option<&str>,
            _page_size: u32,
        ) -> Result<BlockPage> {
            let (_, blocks) = self
                .pages
                .get(block_id)
                .ok_or_else(|| anyhow::anyhow!("object_not_found: {}", block_id))?;
            Ok(BlockPage {
                results: blocks.clone(),
                has_more: false,
                next_cursor: None,
            })
        }

        async fn retrieve_page(&self, page_id: &str) -> Result<Value> {
            match self.pages.get(page_id) {
                Some((Some(title), _)) => Ok(json!({
                    "properties": { "Name": { "type": "title", "title": [{ "plain_text": title }] } }
                })),
                _ => anyhow::bail!("no page metadata for {}", page_id),
            }
        }
    }

    fn chunking() -> ChunkingConfig {
        ChunkingConfig {
            size: 50,
            overlap: 10,
        }
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn content_page_ids(index: &ChunkIndex, query: &str) -> Vec<String> {
        index.search(query, 50).unwrap()[1]
            .records
            .iter()
            .map(|r| r.page_id.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_failed_page_does_not_abort_batch() {
        let notes = FakeNotes::default()
            .page("p1", Some("One"), &["alpha notes"])
            .page("p3", Some("Three"), &["gamma notes"]);
        let mut index = ChunkIndex::new().unwrap();

        let report = index_pages(
            &notes,
            &mut index,
            &ids(&["p1", "p2", "p3"]),
            &chunking(),
            RebuildMode::Full,
        )
        .await
        .unwrap();

        assert_eq!(report.requested, 3);
        assert_eq!(report.indexed_pages(), 2);
        assert_eq!(report.failed_pages(), 1);
        assert_eq!(report.failed_page_ids(), vec!["p2"]);
        assert!(matches!(
            &report.outcomes[1],
            PageOutcome::Failed { page_id, error: BridgeError::Extraction { .. } } if page_id == "p2"
        ));

        let mut found = content_page_ids(&index, "notes");
        found.sort();
        assert_eq!(found, vec!["p1", "p3"]);
    }

    #[tokio::test]
    async fn test_empty_page_is_silently_absent() {
        let notes = FakeNotes::default()
            .page("p1", Some("Ops"), &["backups nightly"])
            .page("blank", Some("Blank"), &[]);
        let mut index = ChunkIndex::new().unwrap();

        let report = index_pages(
            &notes,
            &mut index,
            &ids(&["p1", "blank"]),
            &chunking(),
            RebuildMode::Full,
        )
        .await
        .unwrap();

        assert!(matches!(&report.outcomes[1], PageOutcome::Empty { page_id } if page_id == "blank"));
        assert_eq!(report.failed_pages(), 0);
        assert!(report.failed_page_ids().is_empty());
        assert_eq!(report.outcomes[1].page_id(), "blank");
        assert_eq!(index.stats().unwrap().pages, 1);
    }

    #[tokio::test]
    async fn test_full_rebuild_replaces_previous_pages() {
        let notes = FakeNotes::default()
            .page("p1", Some("One"), &["shared keyword"])
            .page("p2", Some("Two"), &["shared keyword"])
            .page("p3", Some("Three"), &["shared keyword"]);
        let mut index = ChunkIndex::new().unwrap();

        index_pages(&notes, &mut index, &ids(&["p1", "p2"]), &chunking(), RebuildMode::Full)
            .await
            .unwrap();
        let mut first = content_page_ids(&index, "shared");
        first.sort();
        assert_eq!(first, vec!["p1", "p2"]);

        index_pages(&notes, &mut index, &ids(&["p3"]), &chunking(), RebuildMode::Full)
            .await
            .unwrap();
        assert_eq!(content_page_ids(&index, "shared"), vec!["p3"]);
    }

    #[tokio::test]
    async fn test_upsert_keeps_other_pages_and_reuses_ids() {
        let notes = FakeNotes::default()
            .page("p1", Some("One"), &["shared keyword"])
            .page("p2", Some("Two"), &["shared keyword"]);
        let mut index = ChunkIndex::new().unwrap();

        index_pages(&notes, &mut index, &ids(&["p1", "p2"]), &chunking(), RebuildMode::Upsert)
            .await
            .unwrap();
        index_pages(&notes, &mut index, &ids(&["p1"]), &chunking(), RebuildMode::Upsert)
            .await
            .unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats, crate::index::IndexStats { chunks: 2, pages: 2 });
    }

    #[tokio::test]
    async fn test_title_failure_defaults_but_page_is_indexed() {
        let notes = FakeNotes::default().page("p1", None, &["orphan text"]);
        let mut index = ChunkIndex::new().unwrap();

        let report = index_pages(&notes, &mut index, &ids(&["p1"]), &chunking(), RebuildMode::Full)
            .await
            .unwrap();

        match &report.outcomes[0] {
            PageOutcome::Indexed {
                page,
                title_defaulted,
                ..
            } => {
                assert!(*title_defaulted);
                assert_eq!(page.title, crate::connector_notion::UNTITLED);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        let hits = index.search("orphan", 5).unwrap();
        assert_eq!(hits[1].records[0].title, "Untitled");
    }

    #[tokio::test]
    async fn test_chunk_ids_stable_across_rebuilds() {
        let notes = FakeNotes::default().page("p1", Some("One"), &["stable words ".repeat(20).as_str()]);
        let (first, _) = collect_chunks(&notes, &ids(&["p1"]), &chunking()).await;
        let (second, _) = collect_chunks(&notes, &ids(&["p1"]), &chunking()).await;
        assert!(first.len() > 1);
        assert_eq!(first, second);
    }
}
