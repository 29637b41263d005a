//! HTTP handlers

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    response::Json,
};
use serde_json::{json, Value};
use studyforge_models::{
    AskRequest, AskResponse, ContextRequest, ExplainRequest, ExplainResponse, FlashcardsResponse,
    QuizResponse, UploadResponse, UploadedDocument,
};
use studyforge_utils::{validate_request, StudyError, StudyResult};
use tracing::info;

use crate::normalizer::normalize;
use crate::AppState;

pub const NO_FILE_UPLOADED: &str = "No file uploaded";
pub const NO_EXTRACTABLE_TEXT: &str = "No extractable text found in document";

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "studyforge",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Upload a document and get its study artifact
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> StudyResult<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| {
        info!(error = %e, "Upload without a multipart body");
        StudyError::validation("file", NO_FILE_UPLOADED)
    })?;

    let document = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| StudyError::validation("file", NO_FILE_UPLOADED))?;

    info!(
        filename = %document.filename,
        format = %document.format,
        size_bytes = document.data.len(),
        "Document received"
    );

    let text = normalize(&state.pipeline.extract(&document).await);
    if text.is_empty() {
        return Err(StudyError::validation("file", NO_EXTRACTABLE_TEXT));
    }

    if let Some(artifact) = state.cache.get(&text).await {
        state.metrics.cache_hits.inc();
        info!(filename = %document.filename, chars = text.len(), cache_hit = true, "Serving cached artifact");
        return Ok(Json(UploadResponse { summary: artifact }));
    }
    state.metrics.cache_misses.inc();
    info!(filename = %document.filename, chars = text.len(), cache_hit = false, "Generating artifact");

    let artifact = state.gateway.generate_artifact(&text).await?;
    let entries = state.cache.set(text, artifact.clone()).await;
    state.metrics.cache_entries.set(entries as i64);

    Ok(Json(UploadResponse { summary: artifact }))
}

/// First multipart field that carries a filename.
async fn read_file_field(multipart: &mut Multipart) -> StudyResult<Option<UploadedDocument>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StudyError::validation("file", format!("Upload error: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| StudyError::validation("file", format!("Read error: {}", e)))?;

        return Ok(Some(UploadedDocument::new(filename, data.to_vec())));
    }

    Ok(None)
}

pub async fn ask_question(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> StudyResult<Json<AskResponse>> {
    let Json(request) = payload.map_err(json_rejection)?;
    validate_request(&request)?;

    let response = state.gateway.answer_question(&request.query, &request.context).await?;
    Ok(Json(AskResponse { response }))
}

pub async fn generate_flashcards(
    State(state): State<AppState>,
    payload: Result<Json<ContextRequest>, JsonRejection>,
) -> StudyResult<Json<FlashcardsResponse>> {
    let Json(request) = payload.map_err(json_rejection)?;
    validate_request(&request)?;

    let flashcards = state.gateway.generate_flashcards(&request.context).await?;
    Ok(Json(FlashcardsResponse { flashcards }))
}

pub async fn generate_quiz(
    State(state): State<AppState>,
    payload: Result<Json<ContextRequest>, JsonRejection>,
) -> StudyResult<Json<QuizResponse>> {
    let Json(request) = payload.map_err(json_rejection)?;
    validate_request(&request)?;

    let quiz = state.gateway.generate_quiz(&request.context).await?;
    Ok(Json(QuizResponse { quiz }))
}

pub async fn explain_answer(
    State(state): State<AppState>,
    payload: Result<Json<ExplainRequest>, JsonRejection>,
) -> StudyResult<Json<ExplainResponse>> {
    let Json(request) = payload.map_err(json_rejection)?;
    validate_request(&request)?;

    let explanation = state
        .gateway
        .explain_answer(&request.question, &request.correct_answer)
        .await?;
    Ok(Json(ExplainResponse { explanation }))
}

fn json_rejection(rejection: JsonRejection) -> StudyError {
    StudyError::validation("body", rejection.body_text())
}
