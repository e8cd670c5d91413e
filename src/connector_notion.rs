//! Notes-service connector and content extractor.
//!
//! Pages are read through the [`NotesSource`] trait so the extraction logic
//! can run against the real Notion API ([`NotionClient`]) or an in-memory
//! fake in tests.
//!
//! # Extraction
//!
//! A page's content is a paginated list of typed blocks. [`extract_text`]
//! follows the `next_cursor` continuation until the service reports
//! `has_more = false`, then renders every recognised block:
//!
//! | Block type | Separator after text |
//! |------------|----------------------|
//! | `paragraph`, `heading_1..3` | blank line |
//! | `bulleted_list_item`, `numbered_list_item`, `to_do` | newline |
//! | `code` | blank line |
//!
//! Any other block type is skipped without error. Skips are reported in
//! [`PageText::skipped`] so callers can tell them apart from empty blocks.
//!
//! # Titles
//!
//! [`fetch_title`] never fails: a missing title property or a failed lookup
//! degrades to [`UNTITLED`], and the [`TitleLookup`] outcome records why.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::NotionConfig;
use crate::error::BridgeError;

/// Title used when a page has none or the lookup fails.
pub const UNTITLED: &str = "Untitled";

/// One page of block children as returned by the notes service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockPage {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Read access to a notes service.
#[async_trait]
pub trait NotesSource: Send + Sync {
    /// List one page of a block's children, starting at `start_cursor`.
    async fn list_block_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
        page_size: u32,
    ) -> Result<BlockPage>;

    /// Retrieve a page object, including its properties.
    async fn retrieve_page(&self, page_id: &str) -> Result<Value>;

    /// Page size used when listing block children.
    fn page_size(&self) -> u32 {
        100
    }
}

// ============ Notion HTTP client ============

/// [`NotesSource`] backed by the Notion REST API.
pub struct NotionClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
    version: String,
    page_size: u32,
}

impl NotionClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `notion.token` (or `NOTION_TOKEN`) is not set.
    pub fn new(config: &NotionConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| anyhow::anyhow!("NOTION_TOKEN is not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token,
            version: config.version.clone(),
            page_size: config.page_size,
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Notes request failed: GET {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Notes API error (HTTP {}): {}",
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl NotesSource for NotionClient {
    async fn list_block_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
        page_size: u32,
    ) -> Result<BlockPage> {
        let url = format!("{}/blocks/{}/children", self.api_url, block_id);
        let mut query = vec![("page_size", page_size.to_string())];
        if let Some(cursor) = start_cursor {
            query.push(("start_cursor", cursor.to_string()));
        }
        let json = self.get_json(&url, &query).await?;
        serde_json::from_value(json).context("Invalid block children response")
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Value> {
        let url = format!("{}/pages/{}", self.api_url, page_id);
        self.get_json(&url, &[]).await
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }
}

// ============ Block listing ============

/// Fetch every block of a page, following continuation cursors.
pub async fn list_all_blocks(source: &dyn NotesSource, page_id: &str) -> Result<Vec<Value>> {
    let page_size = source.page_size().clamp(1, 100);
    let mut blocks = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = source
            .list_block_children(page_id, cursor.as_deref(), page_size)
            .await?;
        blocks.extend(page.results);

        match (page.has_more, page.next_cursor) {
            (true, Some(next)) => cursor = Some(next),
            (true, None) => {
                warn!(page_id, "notes service reported more blocks without a cursor");
                break;
            }
            (false, _) => break,
        }
    }

    Ok(blocks)
}

// ============ Block rendering ============

/// Rendering outcome for a single block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockText {
    /// Recognised block: its text followed by the separator for its type.
    Rendered { text: String, separator: &'static str },
    /// Unrecognised block type, contributes nothing.
    Skipped { kind: String },
}

/// Render a block into text, or report it as skipped.
pub fn render_block(block: &Value) -> BlockText {
    let kind = block.get("type").and_then(Value::as_str).unwrap_or("");
    let separator = match kind {
        "paragraph" | "heading_1" | "heading_2" | "heading_3" => "\n\n",
        "bulleted_list_item" | "numbered_list_item" | "to_do" => "\n",
        "code" => "\n\n",
        other => {
            return BlockText::Skipped {
                kind: other.to_string(),
            }
        }
    };

    let text = block
        .get(kind)
        .and_then(|body| body.get("rich_text"))
        .map(plain_text)
        .unwrap_or_default();

    BlockText::Rendered { text, separator }
}

/// Concatenate the `plain_text` of every run in a rich-text array.
fn plain_text(rich_text: &Value) -> String {
    rich_text
        .as_array()
        .map(|runs| {
            runs.iter()
                .filter_map(|run| run.get("plain_text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// Extracted text of one page.
#[derive(Debug, Clone, Default)]
pub struct PageText {
    pub text: String,
    /// Number of recognised blocks.
    pub rendered: usize,
    /// Type names of skipped blocks, in document order.
    pub skipped: Vec<String>,
}

impl PageText {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Flatten already-fetched blocks into page text.
pub fn render_blocks(blocks: &[Value]) -> PageText {
    let mut out = PageText::default();
    let mut buf = String::new();

    for block in blocks {
        match render_block(block) {
            BlockText::Rendered { text, separator } => {
                buf.push_str(&text);
                buf.push_str(separator);
                out.rendered += 1;
            }
            BlockText::Skipped { kind } => out.skipped.push(kind),
        }
    }

    out.text = buf.trim().to_string();
    out
}

/// Fetch and flatten all blocks of a page.
pub async fn extract_text(source: &dyn NotesSource, page_id: &str) -> Result<PageText> {
    let blocks = list_all_blocks(source, page_id).await?;
    let text = render_blocks(&blocks);
    debug!(
        page_id,
        blocks = blocks.len(),
        rendered = text.rendered,
        skipped = text.skipped.len(),
        "extracted page text"
    );
    Ok(text)
}

// ============ Titles ============

/// Why a title fell back to [`UNTITLED`].
#[derive(Debug)]
pub enum TitleDefault {
    /// The page has no non-empty title property.
    Missing,
    /// The lookup itself failed.
    Failed(BridgeError),
}

/// Outcome of a title lookup.
#[derive(Debug)]
pub enum TitleLookup {
    Found(String),
    Defaulted(TitleDefault),
}

impl TitleLookup {
    pub fn title(&self) -> &str {
        match self {
            TitleLookup::Found(title) => title,
            TitleLookup::Defaulted(_) => UNTITLED,
        }
    }

    pub fn into_title(self) -> String {
        match self {
            TitleLookup::Found(title) => title,
            TitleLookup::Defaulted(_) => UNTITLED.to_string(),
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, TitleLookup::Defaulted(_))
    }
}

/// Find the title in a page object: the first property of type `title`.
pub fn title_from_page(page: &Value) -> Option<String> {
    let properties = page.get("properties")?.as_object()?;
    properties
        .values()
        .find(|prop| prop.get("type").and_then(Value::as_str) == Some("title"))
        .and_then(|prop| prop.get("title"))
        .map(plain_text)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Look up a page title. Never fails; see [`TitleLookup`].
pub async fn fetch_title(source: &dyn NotesSource, page_id: &str) -> TitleLookup {
    match source.retrieve_page(page_id).await {
        Ok(page) => match title_from_page(&page) {
            Some(title) => TitleLookup::Found(title),
            None => TitleLookup::Defaulted(TitleDefault::Missing),
        },
        Err(e) => {
            let err = BridgeError::TitleLookup {
                page_id: page_id.to_string(),
                message: format!("{:#}", e),
            };
            debug!(error = %err, "using default title");
            TitleLookup::Defaulted(TitleDefault::Failed(err))
        }
    }
}
