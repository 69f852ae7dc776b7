//! HTTP server for newsvec
//!
//! Exposes the embedder and the vector index over HTTP using axum.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness
//! - `POST /ingest` - Embed documents and store them
//! - `POST /upsert` - Store pre-computed vectors
//! - `POST /query` - Embed a query and return the nearest documents
//! - `POST /embed` - Embed texts without storing them
//! - `POST /reset` - Drop every stored document
//! - `GET /stats` - Index bookkeeping

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use newsvec_core::{IndexError, IndexStats, SearchHit, UpsertItem, UpsertReport, VectorIndex};
use newsvec_embed::Embedder;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ServiceConfig, DEFAULT_K, MAX_BODY_BYTES};

/// Shared application state
///
/// # Concurrency Model
///
/// The index serializes writers and lets readers run concurrently behind its
/// own lock. Handlers embed text *before* touching the index, so no lock is
/// ever held across a provider round trip.
pub struct AppState {
    pub index: Arc<VectorIndex>,
    pub embedder: Embedder,
    /// `k` for queries that omit it
    pub default_k: usize,
}

impl AppState {
    pub fn new(index: Arc<VectorIndex>, embedder: Embedder) -> Self {
        Self {
            index,
            embedder,
            default_k: DEFAULT_K,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            index: Arc::new(VectorIndex::with_provider(config.backend_provider())),
            embedder: Embedder::new(&config.embedder_config()),
            default_k: config.default_k,
        }
    }
}

/// Document to embed and store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    pub documents: Vec<Document>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub report: UpsertReport,
    #[serde(rename = "usedModel")]
    pub used_model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub items: Vec<UpsertItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpsertResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub report: UpsertReport,
}

/// Query request body
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Query text; blank is rejected
    #[serde(default)]
    pub query: Option<String>,

    /// Number of results (server default when omitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub hits: Vec<SearchHit>,
    #[serde(rename = "usedModel")]
    pub used_model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f64>>,
    #[serde(rename = "usedModel")]
    pub used_model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn rejection_response(rejection: JsonRejection) -> Response {
    error_response(rejection.status(), rejection.body_text())
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(OkResponse { ok: true })
}

/// POST /ingest - Embed documents, then store them
///
/// The whole batch is embedded with one method before the index is locked.
async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    let start = Instant::now();
    let texts: Vec<&str> = request.documents.iter().map(|d| d.text.as_str()).collect();
    let embeddings = state.embedder.embed(&texts).await;
    let used_model = embeddings.method.used_model().to_string();

    let items = request
        .documents
        .into_iter()
        .zip(embeddings.vectors)
        .map(|(doc, vector)| UpsertItem::new(doc.id, doc.text, doc.source, vector))
        .collect();
    let report = state.index.upsert(items);

    tracing::info!(
        "Ingested {} documents with {} in {:.1}ms ({} rejected, backend {})",
        report.count,
        used_model,
        start.elapsed().as_secs_f64() * 1000.0,
        report.rejected.len(),
        report.backend
    );

    Json(IngestResponse {
        ok: true,
        report,
        used_model,
    })
    .into_response()
}

/// POST /upsert - Store caller-supplied vectors
async fn upsert(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpsertRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    let report = state.index.upsert(request.items);
    Json(UpsertResponse { ok: true, report }).into_response()
}

/// POST /query - Nearest documents to a text query
async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    let text = match request.query.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => return error_response(StatusCode::BAD_REQUEST, "query is required"),
    };
    let k = request.k.unwrap_or(state.default_k);

    let start = Instant::now();
    let embedding = state.embedder.embed_one(text).await;
    let used_model = embedding.method.used_model().to_string();

    match state.index.query(&embedding.vector, k) {
        Ok(hits) => {
            tracing::debug!(
                "Query returned {} hits in {:.1}ms",
                hits.len(),
                start.elapsed().as_secs_f64() * 1000.0
            );
            Json(QueryResponse { hits, used_model }).into_response()
        }
        Err(e @ IndexError::DimensionMismatch { .. }) => {
            tracing::warn!(
                "Query embedded with {} does not match the index: {}",
                used_model,
                e
            );
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// POST /embed - Vectors only, nothing stored
async fn embed(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    let embeddings = state.embedder.embed(&request.texts).await;
    Json(EmbedResponse {
        used_model: embeddings.method.used_model().to_string(),
        vectors: embeddings.vectors,
    })
    .into_response()
}

/// POST /reset
async fn reset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.index.reset();
    Json(OkResponse { ok: true })
}

/// GET /stats
async fn stats(State(state): State<Arc<AppState>>) -> Json<IndexStats> {
    Json(state.index.stats())
}

/// Create the axum router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/upsert", post(upsert))
        .route("/query", post(query))
        .route("/embed", post(embed))
        .route("/reset", post(reset))
        .route("/stats", get(stats))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server, stopping on Ctrl-C
pub async fn serve(state: Arc<AppState>, addr: std::net::SocketAddr) -> std::io::Result<()> {
    let router = create_router(state);

    tracing::info!("Starting newsvec server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use newsvec_core::{BackendKind, MemoryOnly};
    use tower::ServiceExt;

    fn create_test_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(VectorIndex::with_provider(Arc::new(MemoryOnly))),
            Embedder::offline(64),
        ))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = create_router(create_test_state());

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_query_requires_text() {
        let state = create_test_state();

        for body in [
            serde_json::json!({}),
            serde_json::json!({"query": ""}),
            serde_json::json!({"query": "   ", "k": 3}),
        ] {
            let router = create_router(state.clone());
            let response = router.oneshot(post_json("/query", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["error"], "query is required");
        }
    }

    #[tokio::test]
    async fn test_query_on_empty_index() {
        let router = create_router(create_test_state());

        let response = router
            .oneshot(post_json("/query", serde_json::json!({"query": "anything"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["hits"], serde_json::json!([]));
        assert_eq!(json["usedModel"], "hash-fallback");
    }

    #[tokio::test]
    async fn test_upsert_dimension_mismatch_is_reported() {
        let state = create_test_state();

        let first = create_router(state.clone())
            .oneshot(post_json(
                "/upsert",
                serde_json::json!({"items": [{"id": "a", "vector": [1.0, 0.0]}]}),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = create_router(state.clone())
            .oneshot(post_json(
                "/upsert",
                serde_json::json!({"items": [{"id": "b", "vector": [1.0, 0.0, 0.0]}]}),
            ))
            .await
            .unwrap();
        let json = body_json(second).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["count"], 0);
        assert_eq!(json["rejected"][0]["id"], "b");
        assert_eq!(json["rejected"][0]["reason"]["kind"], "dimension_mismatch");
        assert_eq!(state.index.count(), 1);
    }

    #[tokio::test]
    async fn test_stats_and_reset() {
        let state = create_test_state();
        state
            .index
            .upsert(vec![UpsertItem::new("a", "t", "s", vec![0.0, 1.0])]);

        let response = create_router(state.clone())
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let stats: IndexStats = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.dim, Some(2));
        assert_eq!(stats.backend, BackendKind::Memory);

        let response = create_router(state.clone())
            .oneshot(Request::post("/reset").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.index.stats().epoch, 1);
        assert_eq!(state.index.count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_shape() {
        let router = create_router(create_test_state());

        let request = Request::builder()
            .method("POST")
            .uri("/ingest")
            .header("Content-Type", "application/json")
            .body(Body::from("{\"documents\": 42}"))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
        let json = body_json(response).await;
        assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let router = create_router(create_test_state());
        let text = "x".repeat(MAX_BODY_BYTES + 1);

        let response = router
            .oneshot(post_json("/embed", serde_json::json!({"texts": [text]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
