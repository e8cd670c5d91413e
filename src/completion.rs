//! Completion client for a locally hosted generative model.
//!
//! [`OllamaClient`] calls `POST {url}/api/generate` with
//! `{ model, prompt, stream: false }` and a configurable timeout (120 s by
//! default). Any transport error, timeout or non-2xx status becomes
//! [`BridgeError::Upstream`]. There are no retries.
//!
//! # Response normalisation
//!
//! The model server's response shape is not strictly contracted, so
//! [`normalize_response`] accepts three shapes, in order:
//!
//! 1. an object with a string `response` field → that field;
//! 2. a bare JSON string → the string;
//! 3. anything else → its compact JSON serialisation.
//!
//! A body that is not JSON at all is returned verbatim.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{BridgeError, BridgeResult};

/// A single request/response text completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> BridgeResult<String>;
}

/// [`CompletionClient`] for Ollama-compatible `/api/generate` endpoints.
pub struct OllamaClient {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.name.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> BridgeResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let resp = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { "timed out" } else { "failed" };
                BridgeError::upstream(format!(
                    "Model request {} (is the model server running at {}?): {}",
                    kind, self.url, e
                ))
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| BridgeError::upstream(format!("Failed to read model response: {}", e)))?;

        if !status.is_success() {
            return Err(BridgeError::upstream(format!(
                "Model API error (HTTP {}): {}",
                status,
                text.chars().take(500).collect::<String>()
            )));
        }

        debug!(bytes = text.len(), "model response received");
        Ok(normalize_body(&text))
    }
}

/// Normalise a raw response body, falling back to the text itself when it
/// is not JSON.
pub fn normalize_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => normalize_response(&json),
        Err(_) => body.to_string(),
    }
}

/// Extract the answer text from a parsed model response.
pub fn normalize_response(json: &Value) -> String {
    if let Some(answer) = json.get("response").and_then(Value::as_str) {
        return answer.to_string();
    }
    if let Some(answer) = json.as_str() {
        return answer.to_string();
    }
    json.to_string()
}
