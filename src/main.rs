//! # Notes Bridge CLI (`notes-bridge`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `notes-bridge serve` | Index the default pages and start the HTTP server |
//! | `notes-bridge ask "<question>"` | Index, ask once, print the answer |
//! | `notes-bridge search "<query>"` | Index, print the selected chunks without calling the model |
//!
//! ## Examples
//!
//! ```bash
//! # Serve with settings taken from the environment (.env is honoured)
//! NOTION_TOKEN=secret NOTION_PAGE_IDS=abc,def notes-bridge serve
//!
//! # One-shot question against two extra pages
//! notes-bridge --config ./bridge.toml ask "when do backups run?" --page-id 123 --page-id 456
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use notes_bridge::bridge::Bridge;
use notes_bridge::completion::OllamaClient;
use notes_bridge::config::{self, Config};
use notes_bridge::connector_notion::NotionClient;
use notes_bridge::{logging, server};

/// Notes Bridge: answer questions about your notes with a local model.
///
/// Settings come from an optional TOML file and the environment
/// (`NOTION_TOKEN`, `NOTION_PAGE_IDS`, `OLLAMA_URL`, `OLLAMA_MODEL`, `PORT`).
#[derive(Parser)]
#[command(name = "notes-bridge", version)]
struct Cli {
    /// Path to an optional configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Indexes the configured default page ids first. A failed startup
    /// index is logged and the server starts anyway.
    Serve,

    /// Index pages, ask one question and print the answer.
    Ask {
        /// The question.
        query: String,

        /// Maximum number of chunks sent to the model.
        #[arg(long)]
        top_k: Option<i64>,

        /// Extra page ids to index, on top of the configured defaults.
        #[arg(long = "page-id")]
        page_ids: Vec<String>,
    },

    /// Index pages and print the chunks a question would use.
    Search {
        /// The search query.
        query: String,

        /// Maximum number of chunks to print.
        #[arg(long)]
        limit: Option<i64>,

        /// Extra page ids to index, on top of the configured defaults.
        #[arg(long = "page-id")]
        page_ids: Vec<String>,
    },
}

fn build_bridge(cfg: Config) -> anyhow::Result<Arc<Bridge>> {
    let notes = NotionClient::new(&cfg.notion)?;
    let completion = OllamaClient::new(&cfg.model)?;
    Ok(Arc::new(Bridge::new(
        Arc::new(cfg),
        Arc::new(notes),
        Arc::new(completion),
    )?))
}

async fn index_for_command(bridge: &Bridge, extra: &[String]) -> anyhow::Result<()> {
    let page_ids = bridge.merge_page_ids(extra);
    if page_ids.is_empty() {
        anyhow::bail!("No page ids to index. Set NOTION_PAGE_IDS or pass --page-id.");
    }
    let report = bridge.reindex(&page_ids).await?;
    if report.failed_pages() > 0 {
        eprintln!(
            "warning: {} of {} pages failed to index",
            report.failed_pages(),
            report.requested
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;
    let bridge = build_bridge(cfg)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(bridge).await?;
        }
        Commands::Ask {
            query,
            top_k,
            page_ids,
        } => {
            index_for_command(&bridge, &page_ids).await?;
            let answer = bridge.ask(&query, top_k).await?;
            println!("{}", answer.answer.trim());
            println!();
            println!("(used {} chunks)", answer.used_chunks);
        }
        Commands::Search {
            query,
            limit,
            page_ids,
        } => {
            index_for_command(&bridge, &page_ids).await?;
            let top_k = bridge.resolve_top_k(limit)?;
            let chunks = bridge.retrieve(&query, top_k).await?;
            if chunks.is_empty() {
                println!("No results.");
            }
            for (i, chunk) in chunks.iter().enumerate() {
                println!("{}. [{}] chunk#{}", i + 1, chunk.title, chunk.chunk_index);
                println!("    page: {}", chunk.page_id);
                println!("    id: {}", chunk.id);
                let excerpt: String = chunk.content.chars().take(160).collect();
                println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
                println!();
            }
        }
    }

    Ok(())
}
