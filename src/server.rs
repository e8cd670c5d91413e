//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/reindex` | Rebuild the index from default + requested page ids |
//! | `POST` | `/ask` | Answer a question from the indexed notes |
//! | `GET`  | `/health` | Health check with index statistics |
//!
//! # Error Contract
//!
//! Validation failures return `400` with `{ "error": "<message>" }`.
//! Completion and index failures return `500` with
//! `{ "error": "<summary>", "details": "<message>" }`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based clients
//! can call the bridge directly.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::bridge::Bridge;
use crate::error::BridgeError;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<Bridge>,
}

/// Build the router without binding, for embedding or tests.
pub fn router(bridge: Arc<Bridge>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/reindex", post(handle_reindex))
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { bridge })
}

/// Index the configured default pages, logging rather than failing.
pub async fn index_on_startup(bridge: &Bridge) {
    let page_ids = bridge.merge_page_ids(&[]);
    if page_ids.is_empty() {
        info!("no default page ids configured, starting with an empty index");
        return;
    }
    if let Err(e) = bridge.reindex(&page_ids).await {
        warn!(error = %e, "startup indexing failed");
    }
}

/// Index the default pages, then serve until the process is terminated.
pub async fn run_server(bridge: Arc<Bridge>) -> anyhow::Result<()> {
    let bind_addr = bridge.config().server.bind_addr();
    index_on_startup(&bridge).await;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on http://{}", bind_addr);
    axum::serve(listener, router(bridge)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Handler error that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    body: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorBody {
            error: message.into(),
            details: None,
        },
    }
}

fn internal(summary: &str, details: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorBody {
            error: summary.to_string(),
            details: Some(details.into()),
        },
    }
}

impl From<BridgeError> for AppError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Validation(message) => bad_request(message),
            BridgeError::Upstream(message) => internal("completion failed", message),
            other => internal("internal error", other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ POST /reindex ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexRequest {
    #[serde(default)]
    pub page_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReindexResponse {
    /// Number of page ids submitted for indexing, not pages that succeeded.
    pub indexed: usize,
}

async fn handle_reindex(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ReindexResponse>, AppError> {
    // An empty body is allowed when default page ids are configured.
    let requested = if body.iter().all(u8::is_ascii_whitespace) {
        ReindexRequest::default()
    } else {
        serde_json::from_slice::<ReindexRequest>(&body)
            .map_err(|e| bad_request(format!("invalid JSON body: {}", e)))?
    };
    let page_ids = state.bridge.merge_page_ids(&requested.page_ids);
    if page_ids.is_empty() {
        return Err(bad_request(
            "pageIds is required (no default page ids configured)",
        ));
    }

    state.bridge.reindex(&page_ids).await?;
    Ok(Json(ReindexResponse {
        indexed: page_ids.len(),
    }))
}

// ============ POST /ask ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub top_k: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub used_chunks: usize,
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = payload?;
    let query = req
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| bad_request("query is required"))?;

    let answer = state.bridge.ask(&query, req.top_k).await?;
    Ok(Json(AskResponse {
        answer: answer.answer,
        used_chunks: answer.used_chunks,
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    chunks: u64,
    pages: usize,
    last_rebuild: Option<String>,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let stats = state.bridge.stats().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chunks: stats.chunks,
        pages: stats.pages,
        last_rebuild: state.bridge.last_rebuild().await.map(|t| t.to_rfc3339()),
    }))
}
