//! Composition root tying the pipeline together.
//!
//! A [`Bridge`] owns the chunk index and the two remote collaborators, and
//! exposes the two operations the HTTP surface and CLI need:
//!
//! - [`Bridge::reindex`] rebuilds the index from a list of page ids.
//! - [`Bridge::ask`] retrieves the top-K chunks for a question, builds the
//!   prompt and returns the model's answer.
//!
//! # Concurrency
//!
//! Reindex calls are single-flight: a rebuild gate serialises them end to
//! end. Pages are fetched before the index write lock is taken, so asks keep
//! reading the previous index until the rebuilt one is committed. Asks only
//! take the read lock and run concurrently with each other.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::completion::CompletionClient;
use crate::config::Config;
use crate::connector_notion::NotesSource;
use crate::error::{BridgeError, BridgeResult};
use crate::index::{ChunkIndex, IndexStats};
use crate::ingest::{collect_chunks, finish_rebuild, IndexReport};
use crate::models::ChunkRecord;
use crate::prompt::build_prompt;
use crate::retrieval::select_top_k;

/// The model's answer plus the number of chunks it was given.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub used_chunks: usize,
}

pub struct Bridge {
    config: Arc<Config>,
    notes: Arc<dyn NotesSource>,
    completion: Arc<dyn CompletionClient>,
    index: RwLock<ChunkIndex>,
    rebuild_gate: Mutex<()>,
    last_rebuild: RwLock<Option<DateTime<Utc>>>,
}

impl Bridge {
    pub fn new(
        config: Arc<Config>,
        notes: Arc<dyn NotesSource>,
        completion: Arc<dyn CompletionClient>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            notes,
            completion,
            index: RwLock::new(ChunkIndex::new()?),
            rebuild_gate: Mutex::new(()),
            last_rebuild: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Merge the configured default page ids with `requested`.
    ///
    /// Defaults come first; blanks and repeated ids are dropped.
    pub fn merge_page_ids(&self, requested: &[String]) -> Vec<String> {
        let mut merged: Vec<String> = Vec::new();
        for id in self.config.notion.default_page_ids.iter().chain(requested) {
            let id = id.trim();
            if !id.is_empty() && !merged.iter().any(|m| m == id) {
                merged.push(id.to_string());
            }
        }
        merged
    }

    /// Rebuild the index from `page_ids`.
    ///
    /// Per-page failures are recorded in the report, never returned. An
    /// empty id list is a validation error.
    pub async fn reindex(&self, page_ids: &[String]) -> BridgeResult<IndexReport> {
        if page_ids.is_empty() {
            return Err(BridgeError::validation("no page ids to index"));
        }

        let _gate = self.rebuild_gate.lock().await;
        let mode = self.config.index.rebuild_mode;

        let (records, outcomes) =
            collect_chunks(self.notes.as_ref(), page_ids, &self.config.chunking).await;

        let report = {
            let mut index = self.index.write().await;
            finish_rebuild(&mut index, mode, page_ids, &records, outcomes)?
        };
        *self.last_rebuild.write().await = Some(report.finished_at);
        Ok(report)
    }

    /// Search the index and select up to `top_k` distinct chunks.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> BridgeResult<Vec<ChunkRecord>> {
        let groups = self.index.read().await.search(query, top_k)?;
        Ok(select_top_k(groups, top_k))
    }

    /// Resolve a caller-supplied top-K against configuration.
    ///
    /// `None` uses the default and `0` selects nothing. Values above
    /// `retrieval.max_top_k` are capped; negative values are rejected.
    pub fn resolve_top_k(&self, top_k: Option<i64>) -> BridgeResult<usize> {
        let retrieval = &self.config.retrieval;
        match top_k {
            None => Ok(retrieval.default_top_k),
            Some(k) if k < 0 => Err(BridgeError::validation("topK must not be negative")),
            Some(k) => Ok(usize::try_from(k)
                .unwrap_or(usize::MAX)
                .min(retrieval.max_top_k)),
        }
    }

    /// Answer `query` from the indexed notes.
    ///
    /// The question goes into the prompt exactly as given.
    pub async fn ask(&self, query: &str, top_k: Option<i64>) -> BridgeResult<Answer> {
        if query.trim().is_empty() {
            return Err(BridgeError::validation("query is required"));
        }
        let top_k = self.resolve_top_k(top_k)?;

        let chunks = self.retrieve(query, top_k).await?;
        let prompt = build_prompt(&chunks, query);
        info!(used_chunks = chunks.len(), top_k, "asking model");

        let answer = self.completion.complete(&prompt).await.map_err(|e| {
            error!(error = %e, "completion failed");
            e
        })?;

        Ok(Answer {
            answer,
            used_chunks: chunks.len(),
        })
    }

    pub async fn stats(&self) -> BridgeResult<IndexStats> {
        Ok(self.index.read().await.stats()?)
    }

    pub async fn last_rebuild(&self) -> Option<DateTime<Utc>> {
        *self.last_rebuild.read().await
    }
}
