//! Error taxonomy for the bridge.
//!
//! Internal plumbing uses `anyhow`; this enum is the boundary type that
//! decides how a failure surfaces. Only [`BridgeError::Validation`] and
//! [`BridgeError::Upstream`] ever reach an HTTP caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing or empty required input. Rejected at the boundary with 400.
    #[error("{0}")]
    Validation(String),

    /// A single page failed to extract during batch indexing. Logged and skipped.
    #[error("failed to extract page {page_id}: {source:#}")]
    Extraction {
        page_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// Title lookup failed. Always swallowed and replaced by the sentinel title.
    #[error("title lookup failed for page {page_id}: {message}")]
    TitleLookup { page_id: String, message: String },

    /// The generative-model call failed or timed out.
    #[error("{0}")]
    Upstream(String),

    /// Failure inside the index itself (commit, reader reload).
    #[error("index error: {0:#}")]
    Index(#[from] anyhow::Error),
}

impl BridgeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
