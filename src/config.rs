//! Configuration loading.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. Built-in defaults (every field has one).
//! 2. An optional TOML file passed with `--config`.
//! 3. Environment variables (`NOTION_TOKEN`, `NOTION_API_URL`,
//!    `NOTION_PAGE_IDS`, `OLLAMA_URL`, `OLLAMA_MODEL`, `MODEL_TIMEOUT_SECS`,
//!    `PORT`).
//!
//! The merged result is validated before use.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub notion: NotionConfig,
    pub model: ModelConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub index: IndexConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotionConfig {
    pub token: Option<String>,
    pub api_url: String,
    pub version: String,
    pub page_size: u32,
    /// Pages indexed at startup and merged into every `/reindex` request.
    pub default_page_ids: Vec<String>,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.notion.com/v1".to_string(),
            version: "2022-06-28".to_string(),
            page_size: 100,
            default_page_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub url: String,
    pub name: String,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            name: "llama3".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub size: usize,
    /// Characters shared between consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: 800,
            overlap: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub max_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: crate::retrieval::DEFAULT_TOP_K,
            max_top_k: 50,
        }
    }
}

/// How a reindex call treats chunks already in the index.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RebuildMode {
    /// Clear everything, then index only the submitted pages.
    #[default]
    Full,
    /// Replace the chunks of the submitted pages, keep the rest.
    Upsert,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct IndexConfig {
    pub rebuild_mode: RebuildMode,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load configuration from an optional TOML file plus the process environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let env: HashMap<String, String> = std::env::vars().collect();
    load_config_with_env(path, &env)
}

/// Like [`load_config`], with the environment supplied explicitly.
pub fn load_config_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };

    config.apply_env(env)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        let get = |key: &str| {
            env.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(token) = get("NOTION_TOKEN") {
            self.notion.token = Some(token);
        }
        if let Some(url) = get("NOTION_API_URL") {
            self.notion.api_url = url;
        }
        if let Some(ids) = get("NOTION_PAGE_IDS") {
            self.notion.default_page_ids = parse_page_ids(&ids);
        }
        if let Some(url) = get("OLLAMA_URL") {
            self.model.url = url;
        }
        if let Some(name) = get("OLLAMA_MODEL") {
            self.model.name = name;
        }
        if let Some(secs) = get("MODEL_TIMEOUT_SECS") {
            self.model.timeout_secs = secs
                .parse()
                .with_context(|| format!("MODEL_TIMEOUT_SECS is not a number: '{}'", secs))?;
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: '{}'", port))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.size == 0 {
            bail!("chunking.size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.size {
            bail!(
                "chunking.overlap ({}) must be smaller than chunking.size ({})",
                self.chunking.overlap,
                self.chunking.size
            );
        }
        if !(1..=100).contains(&self.notion.page_size) {
            bail!("notion.page_size must be in [1, 100]");
        }
        if self.retrieval.default_top_k == 0 {
            bail!("retrieval.default_top_k must be >= 1");
        }
        if self.retrieval.max_top_k < self.retrieval.default_top_k {
            bail!("retrieval.max_top_k must be >= retrieval.default_top_k");
        }
        if self.model.timeout_secs == 0 {
            bail!("model.timeout_secs must be > 0");
        }
        if self.model.name.trim().is_empty() {
            bail!("model.name must not be empty");
        }
        Ok(())
    }
}

/// Split a comma-separated page id list, dropping blanks.
pub fn parse_page_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let cfg = load_config_with_env(None, &HashMap::new()).unwrap();
        assert_eq!(cfg.model.timeout_secs, 120);
        assert_eq!(cfg.retrieval.default_top_k, 5);
        assert_eq!(cfg.notion.page_size, 100);
        assert_eq!(cfg.index.rebuild_mode, RebuildMode::Full);
        assert!(cfg.notion.token.is_none());
        assert_eq!(cfg.server.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_env_overrides() {
        let cfg = load_config_with_env(
            None,
            &env(&[
                ("NOTION_TOKEN", "secret"),
                ("NOTION_PAGE_IDS", " a, ,b ,c,"),
                ("OLLAMA_URL", "http://gpu:11434"),
                ("OLLAMA_MODEL", "mistral"),
                ("PORT", "8080"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.notion.token.as_deref(), Some("secret"));
        assert_eq!(cfg.notion.default_page_ids, vec!["a", "b", "c"]);
        assert_eq!(cfg.model.url, "http://gpu:11434");
        assert_eq!(cfg.model.name, "mistral");
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let cfg = load_config_with_env(None, &env(&[("OLLAMA_MODEL", "  ")])).unwrap();
        assert_eq!(cfg.model.name, "llama3");
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = load_config_with_env(None, &env(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[model]
name = "phi3"
timeout_secs = 30

[chunking]
size = 200
overlap = 20

[index]
rebuild_mode = "upsert"
"#
        )
        .unwrap();

        let cfg = load_config_with_env(Some(file.path()), &env(&[("OLLAMA_MODEL", "qwen")])).unwrap();
        assert_eq!(cfg.model.name, "qwen");
        assert_eq!(cfg.model.timeout_secs, 30);
        assert_eq!(cfg.chunking.size, 200);
        assert_eq!(cfg.index.rebuild_mode, RebuildMode::Upsert);
        // untouched sections keep defaults
        assert_eq!(cfg.retrieval.max_top_k, 50);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chunking]\nsize = 10\noverlap = 10").unwrap();
        let err = load_config_with_env(Some(file.path()), &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_config_with_env(Some(Path::new("/nonexistent/bridge.toml")), &HashMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_example_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("bridge.example.toml");
        let cfg = load_config_with_env(Some(path.as_path()), &HashMap::new()).unwrap();
        assert_eq!(cfg.notion.version, "2022-06-28");
        assert!(cfg.notion.default_page_ids.is_empty());
        assert_eq!(cfg.index.rebuild_mode, RebuildMode::Full);
    }
}
