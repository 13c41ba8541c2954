//! HTTP API: chat, re-ingest, health and suggested questions.

pub mod rate_limit;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use tokio::sync::Mutex as TokioMutex;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Config, RateLimit};
use crate::db::Db;
use crate::embedder::{Embedder, EmbedderError};
use crate::error::{AppError, Result};
use crate::ingest::Ingestor;
use crate::ingest::splitter::RecursiveSplitter;
use crate::llm::CompletionClient;
use crate::rag::{Pipeline, Retriever};
use rate_limit::{
    ClientLimiter, PRUNE_INTERVAL, build_limiter, enforce_rate_limit, spawn_pruner,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<TokioMutex<Db>>,
    pub config: Arc<Config>,
    pub pipeline: Pipeline,
    pub ingestor: Ingestor,
    /// Held for the duration of an ingestion.
    pub ingest_guard: Arc<TokioMutex<()>>,
    pub chat_limiter: Arc<ClientLimiter>,
    pub ingest_limiter: Arc<ClientLimiter>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Db,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn CompletionClient>,
    ) -> Result<Self> {
        if embedder.dimensions() != db.dimensions() {
            return Err(EmbedderError::DimensionMismatch {
                expected: db.dimensions(),
                actual: embedder.dimensions(),
            }
            .into());
        }

        let chat_limit = parse_limit(&config.rate_limit)?;
        let ingest_limit = parse_limit(&config.ingest_rate_limit)?;

        let db = Arc::new(TokioMutex::new(db));
        let retriever = Retriever::new(
            db.clone(),
            embedder.clone(),
            config.top_k_results,
            config.max_context_chars,
        );
        let pipeline = Pipeline::new(retriever, llm, config.max_message_chars);
        let ingestor = Ingestor::new(
            config.documents_path(),
            RecursiveSplitter::new(config.chunk_size, config.chunk_overlap),
            embedder,
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            pipeline,
            ingestor,
            ingest_guard: Arc::new(TokioMutex::new(())),
            chat_limiter: build_limiter(&chat_limit)?,
            ingest_limiter: build_limiter(&ingest_limit)?,
        })
    }
}

fn parse_limit(raw: &str) -> Result<RateLimit> {
    raw.parse()
        .map_err(|e| AppError::Config(format!("invalid rate limit {raw:?}: {e}")))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {o:?}");
                None
            }
        })
        .collect();

    // Credentials rule out wildcards, so methods and headers are mirrored
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn router(state: AppState) -> Router {
    let chat_limit = middleware::from_fn_with_state(state.chat_limiter.clone(), enforce_rate_limit);
    let ingest_limit =
        middleware::from_fn_with_state(state.ingest_limiter.clone(), enforce_rate_limit);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/chat", post(routes::chat).layer(chat_limit))
        .route("/api/ingest", post(routes::ingest).layer(ingest_limit))
        .route("/api/suggested-questions", get(routes::suggested_questions))
        .layer(cors_layer(&state.config.allowed_origins()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.bind_address()` and serve until Ctrl-C.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    use anyhow::Context;

    let addr = state.config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("AbiaCS Assistant API listening on http://{addr}");

    let pruner = spawn_pruner(
        vec![state.chat_limiter.clone(), state.ingest_limiter.clone()],
        PRUNE_INTERVAL,
    );
    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;
    pruner.abort();

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    }
}
