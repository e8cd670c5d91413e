//! Chunk index backed by an in-RAM tantivy index.
//!
//! [`ChunkIndex`] owns the whole lifecycle: [`clear`](ChunkIndex::clear),
//! [`add`](ChunkIndex::add), [`commit`](ChunkIndex::commit) and
//! [`search`](ChunkIndex::search). Readers reload only after a commit, so a
//! search sees either the previous index or the fully rebuilt one.
//!
//! `title` and `content` are searched independently, one query per field,
//! and returned as separate [`ResultGroup`]s in [`SEARCH_FIELDS`] order. A
//! chunk that matches on both fields therefore appears in both groups;
//! [`crate::retrieval::select_top_k`] removes the duplicates.
//!
//! Nothing is persisted. The index starts empty on every process start.

use anyhow::{Context, Result};
use std::collections::HashSet;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, INDEXED, STORED,
    STRING,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use crate::models::{ChunkRecord, ResultGroup};

/// Searchable fields, in the order their result groups are returned.
pub const SEARCH_FIELDS: [&str; 2] = ["title", "content"];

const TOKENIZER: &str = "text_with_stopwords";
const WRITER_HEAP_BYTES: usize = 20_000_000;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with", "or", "but", "not", "this",
    "these", "they", "them", "their", "there", "then", "than", "so", "if", "when", "where", "why",
    "how", "what", "which", "who", "whom", "whose", "can", "could", "should", "would", "may",
    "might", "must", "shall", "do", "does", "did", "have", "had", "having",
];

fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field("id", STRING | STORED);
    builder.add_text_field("page_id", STRING | STORED);
    builder.add_u64_field("chunk_index", INDEXED | STORED);

    let indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default()
        .set_indexing_options(indexing)
        .set_stored();
    builder.add_text_field("title", text_options.clone());
    builder.add_text_field("content", text_options);
    builder.build()
}

fn register_tokenizer(index: &Index) {
    let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(
            STOP_WORDS.iter().map(|s| s.to_string()),
        ))
        .build();
    index.tokenizers().register(TOKENIZER, analyzer);
}

/// Chunk count and distinct page count currently searchable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub chunks: u64,
    pub pages: usize,
}

pub struct ChunkIndex {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    id: Field,
    page_id: Field,
    chunk_index: Field,
    title: Field,
    content: Field,
}

impl ChunkIndex {
    /// Create an empty in-memory index.
    pub fn new() -> Result<Self> {
        let schema = build_schema();
        let index = Index::create_in_ram(schema.clone());
        register_tokenizer(&index);

        let writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .context("Failed to create index writer")?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create index reader")?;

        Ok(Self {
            id: schema.get_field("id")?,
            page_id: schema.get_field("page_id")?,
            chunk_index: schema.get_field("chunk_index")?,
            title: schema.get_field("title")?,
            content: schema.get_field("content")?,
            index,
            reader,
            writer,
        })
    }

    /// Remove every chunk. Searches still see the old contents until the
    /// next [`commit`](Self::commit).
    pub fn clear(&mut self) -> Result<()> {
        self.writer.delete_all_documents()?;
        self.writer.commit()?;
        Ok(())
    }

    /// Stage removal of every chunk belonging to `page_id`.
    pub fn remove_page(&mut self, page_id: &str) -> Result<()> {
        self.writer
            .delete_term(Term::from_field_text(self.page_id, page_id));
        Ok(())
    }

    /// Stage a chunk for indexing.
    pub fn add(&mut self, record: &ChunkRecord) -> Result<()> {
        self.writer.add_document(doc!(
            self.id => record.id.clone(),
            self.page_id => record.page_id.clone(),
            self.chunk_index => record.chunk_index,
            self.title => record.title.clone(),
            self.content => record.content.clone(),
        ))?;
        Ok(())
    }

    /// Commit staged changes and make them visible to searches.
    pub fn commit(&mut self) -> Result<()> {
        self.writer.commit().context("Failed to commit index")?;
        self.reader.reload().context("Failed to reload index reader")?;
        Ok(())
    }

    /// Search each field independently, returning one group per field.
    ///
    /// Blank queries and a zero `limit` return empty groups.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<ResultGroup>> {
        let searcher = self.reader.searcher();
        let mut groups = Vec::with_capacity(SEARCH_FIELDS.len());

        for (name, field) in SEARCH_FIELDS.iter().zip([self.title, self.content]) {
            let mut records = Vec::new();
            if limit > 0 && !query.trim().is_empty() {
                let parser = QueryParser::for_index(&self.index, vec![field]);
                let (parsed, _errors) = parser.parse_query_lenient(query);
                let top_docs = searcher.search(&*parsed, &TopDocs::with_limit(limit))?;
                for (_score, address) in top_docs {
                    let doc: TantivyDocument = searcher.doc(address)?;
                    records.push(self.record_from_doc(&doc));
                }
            }
            groups.push(ResultGroup {
                field: name.to_string(),
                records,
            });
        }

        Ok(groups)
    }

    /// Count chunks and distinct pages in the committed index.
    ///
    /// Reads every stored document to collect page ids, so the cost grows
    /// with the number of chunks. The index is rebuilt from a handful of
    /// pages and only `/health` calls this.
    pub fn stats(&self) -> Result<IndexStats> {
        let searcher = self.reader.searcher();
        let mut pages = HashSet::new();
        for segment in searcher.segment_readers() {
            let store = segment.get_store_reader(1)?;
            for doc_id in segment.doc_ids_alive() {
                let doc: TantivyDocument = store.get(doc_id)?;
                if let Some(page_id) = doc.get_first(self.page_id).and_then(|v| v.as_str()) {
                    pages.insert(page_id.to_string());
                }
            }
        }
        Ok(IndexStats {
            chunks: searcher.num_docs(),
            pages: pages.len(),
        })
    }

    fn record_from_doc(&self, doc: &TantivyDocument) -> ChunkRecord {
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        ChunkRecord {
            id: text(self.id),
            content: text(self.content),
            title: text(self.title),
            page_id: text(self.page_id),
            chunk_index: doc
                .get_first(self.chunk_index)
                .and_then(|v| v.as_u64())
                .unwrap_or_default(),
        }
    }
}
