//! # Notes Bridge
//!
//! A local bridge between a notes service and a locally hosted language model.
//!
//! Pages are pulled from the notes service, flattened to text, split into
//! overlapping chunks and indexed for lexical retrieval. A question is
//! answered by selecting the most relevant chunks, packing them into a
//! prompt and sending it to the model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Notes API  │──▶│  Extract +  │──▶│   tantivy    │
//! │  (blocks)   │   │    Chunk    │   │  (in memory) │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ top-K
//!                   ┌─────────────┐   ┌──────▼───────┐
//!                   │  Model API  │◀──│    Prompt    │
//!                   │  (generate) │   │   Builder    │
//!                   └─────────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`models`] | Core data types |
//! | [`connector_notion`] | Notes-service client and text extraction |
//! | [`chunk`] | Overlapping fixed-window chunking |
//! | [`index`] | In-memory chunk index |
//! | [`ingest`] | Page-batch indexing pipeline |
//! | [`retrieval`] | Top-K deduplicated selection |
//! | [`prompt`] | Prompt formatting |
//! | [`completion`] | Generative-model client |
//! | [`bridge`] | Reindex and ask operations |
//! | [`server`] | HTTP server |
//! | [`error`] | Error taxonomy |
//! | [`logging`] | Log subscriber setup |

pub mod bridge;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod connector_notion;
pub mod error;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod server;
