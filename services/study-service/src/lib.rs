//! StudyForge Study Service
//!
//! Turns uploaded documents (PDF, DOCX, images, spreadsheets, slide decks,
//! other office files, plain text) into study artifacts: summary, flashcards,
//! quiz and study guide. Scanned PDFs are rendered page by page and OCR'd.
//! Follow-up endpoints answer questions, generate more flashcards or quiz
//! questions, and explain quiz answers.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use studyforge_utils::{AppConfig, StudyResult};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod cache;
pub mod docx;
pub mod extraction;
pub mod gateway;
pub mod handlers;
pub mod llm_client;
pub mod metrics;
pub mod middleware;
pub mod normalizer;
pub mod ocr;
pub mod office;
pub mod pdf_processor;
pub mod prompts;
pub mod rasterizer;
pub mod spreadsheet;

use cache::ArtifactCache;
use extraction::DocumentPipeline;
use gateway::StudyGateway;
use handlers::*;
use llm_client::{ChatCompletionClient, GenerationBackend};
use metrics::ServiceMetrics;
use middleware::request_id_middleware;
use prompts::PromptLibrary;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: DocumentPipeline,
    pub cache: ArtifactCache,
    pub gateway: StudyGateway,
    pub metrics: ServiceMetrics,
    pub config: AppConfig,
}

impl AppState {
    /// State backed by the configured chat-completion API.
    pub fn from_config(config: &AppConfig) -> StudyResult<Self> {
        let backend = Arc::new(ChatCompletionClient::new(&config.generation)?);
        Self::with_backend(config, backend)
    }

    /// State with any generation backend; the rest is built from `config`.
    pub fn with_backend(config: &AppConfig, backend: Arc<dyn GenerationBackend>) -> StudyResult<Self> {
        let metrics = ServiceMetrics::new()?;
        let prompts = PromptLibrary::with_overrides(config.generation.prompt_dir.as_deref().map(Path::new))?;

        Ok(Self {
            pipeline: DocumentPipeline::new(&config.extraction, metrics.clone()),
            cache: ArtifactCache::new(),
            gateway: StudyGateway::new(
                backend,
                Arc::new(prompts),
                metrics.clone(),
                config.generation.max_document_chars,
            ),
            metrics,
            config: config.clone(),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let max_request_size = state.config.server.max_request_size;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
                )
                .layer(DefaultBodyLimit::max(max_request_size))
                .layer(axum::middleware::from_fn(request_id_middleware)),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_document))
        .route("/ask", post(ask_question))
        .route("/flashcards", post(generate_flashcards))
        .route("/quiz", post(generate_quiz))
        .route("/explain", post(explain_answer))
}
