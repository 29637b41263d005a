//! Study Gateway
//!
//! Renders the prompt for each study operation and makes exactly one
//! backend call per request.

use std::sync::Arc;
use studyforge_models::StudyArtifact;
use studyforge_utils::{StudyError, StudyResult};
use tracing::{info, warn};

use crate::llm_client::{GenerationBackend, GenerationRequest};
use crate::metrics::ServiceMetrics;
use crate::prompts::PromptLibrary;

pub const DEFAULT_MAX_DOCUMENT_CHARS: usize = 30_000;

/// Returned by `answer_question` when the backend has nothing to say.
pub const NO_ANSWER_FALLBACK: &str = "Sorry, I couldn't find an answer to that question.";

#[derive(Clone)]
pub struct StudyGateway {
    backend: Arc<dyn GenerationBackend>,
    prompts: Arc<PromptLibrary>,
    metrics: ServiceMetrics,
    max_document_chars: usize,
}

impl StudyGateway {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        prompts: Arc<PromptLibrary>,
        metrics: ServiceMetrics,
        max_document_chars: usize,
    ) -> Self {
        Self {
            backend,
            prompts,
            metrics,
            max_document_chars,
        }
    }

    /// Generate the full study artifact for a normalized document.
    pub async fn generate_artifact(&self, normalized_text: &str) -> StudyResult<StudyArtifact> {
        let document_text = truncate_chars(normalized_text, self.max_document_chars);
        if document_text.len() < normalized_text.len() {
            info!(
                chars = normalized_text.chars().count(),
                limit = self.max_document_chars,
                "Document truncated for generation"
            );
        }

        let prompt = self.prompts.study_artifact(document_text)?;
        let parsed = match self.call("artifact", GenerationRequest::json(prompt)).await? {
            Some(raw) => StudyArtifact::parse(&raw),
            None => Err(StudyError::malformed_artifact("generation backend returned no content")),
        };

        parsed.map_err(|e| {
            self.metrics.generation_failures.with_label_values(&["artifact"]).inc();
            warn!(error = %e, "Generated artifact rejected");
            e
        })
    }

    pub async fn answer_question(&self, query: &str, context: &str) -> StudyResult<String> {
        let prompt = self.prompts.answer_question(query, context)?;
        Ok(self
            .call("ask", GenerationRequest::text(prompt))
            .await?
            .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string()))
    }

    pub async fn generate_flashcards(&self, context: &str) -> StudyResult<String> {
        let prompt = self.prompts.flashcards(context)?;
        self.required("flashcards", GenerationRequest::text(prompt)).await
    }

    pub async fn generate_quiz(&self, context: &str) -> StudyResult<String> {
        let prompt = self.prompts.quiz(context)?;
        self.required("quiz", GenerationRequest::text(prompt)).await
    }

    pub async fn explain_answer(&self, question: &str, correct_answer: &str) -> StudyResult<String> {
        let prompt = self.prompts.explain_answer(question, correct_answer)?;
        self.required("explain", GenerationRequest::text(prompt)).await
    }

    async fn required(&self, kind: &'static str, request: GenerationRequest) -> StudyResult<String> {
        self.call(kind, request).await?.ok_or_else(|| {
            self.metrics.generation_failures.with_label_values(&[kind]).inc();
            StudyError::generation(format!("{} generation returned no content", kind))
        })
    }

    async fn call(&self, kind: &'static str, request: GenerationRequest) -> StudyResult<Option<String>> {
        self.metrics.generation_requests.with_label_values(&[kind]).inc();

        match self.backend.generate(&request).await {
            Ok(content) => Ok(content),
            Err(e) => {
                self.metrics.generation_failures.with_label_values(&[kind]).inc();
                Err(e)
            }
        }
    }
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend that replays a fixed reply and records every prompt.
    struct ScriptedBackend {
        reply: StudyResult<Option<String>>,
        prompts: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedBackend {
        fn new(reply: StudyResult<Option<String>>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(&self, request: &GenerationRequest) -> StudyResult<Option<String>> {
            self.prompts.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    fn gateway(backend: Arc<ScriptedBackend>, max_chars: usize) -> (StudyGateway, ServiceMetrics) {
        let metrics = ServiceMetrics::new().unwrap();
        let gateway = StudyGateway::new(
            backend,
            Arc::new(PromptLibrary::new().unwrap()),
            metrics.clone(),
            max_chars,
        );
        (gateway, metrics)
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 30), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[tokio::test]
    async fn artifact_prompt_carries_only_the_leading_chars() {
        let backend = ScriptedBackend::new(Ok(Some(r#"{"summary":"Plants"}"#.to_string())));
        let (gateway, _) = gateway(backend.clone(), 10);

        let artifact = gateway.generate_artifact("0123456789TAIL").await.unwrap();

        assert_eq!(artifact.summary.overview, "Plants");
        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].expect_json);
        assert!(prompts[0].prompt.contains("0123456789"));
        assert!(!prompts[0].prompt.contains("TAIL"));
    }

    #[tokio::test]
    async fn unparseable_artifact_is_malformed() {
        let backend = ScriptedBackend::new(Ok(Some("I cannot help with that.".to_string())));
        let (gateway, metrics) = gateway(backend, DEFAULT_MAX_DOCUMENT_CHARS);

        let err = gateway.generate_artifact("text").await.unwrap_err();
        assert_eq!(err.http_status_code(), 502);
        assert_eq!(metrics.generation_requests.with_label_values(&["artifact"]).get(), 1);
        assert_eq!(metrics.generation_failures.with_label_values(&["artifact"]).get(), 1);
    }

    #[tokio::test]
    async fn empty_artifact_reply_is_malformed_and_counted() {
        let backend = ScriptedBackend::new(Ok(None));
        let (gateway, metrics) = gateway(backend, DEFAULT_MAX_DOCUMENT_CHARS);

        let err = gateway.generate_artifact("text").await.unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_ARTIFACT");
        assert_eq!(metrics.generation_failures.with_label_values(&["artifact"]).get(), 1);
    }

    #[tokio::test]
    async fn empty_answer_falls_back_to_apology() {
        let backend = ScriptedBackend::new(Ok(None));
        let (gateway, _) = gateway(backend, DEFAULT_MAX_DOCUMENT_CHARS);

        let answer = gateway.answer_question("What is ATP?", "Cells").await.unwrap();
        assert_eq!(answer, NO_ANSWER_FALLBACK);
    }

    #[tokio::test]
    async fn empty_flashcards_are_a_generation_error() {
        let backend = ScriptedBackend::new(Ok(None));
        let (gateway, metrics) = gateway(backend, DEFAULT_MAX_DOCUMENT_CHARS);

        let err = gateway.generate_flashcards("Cells").await.unwrap_err();

        assert_eq!(err.error_code(), "GENERATION_ERROR");
        assert_eq!(metrics.generation_failures.with_label_values(&["flashcards"]).get(), 1);
    }

    #[tokio::test]
    async fn backend_failure_is_counted_and_propagated() {
        let backend = ScriptedBackend::new(Err(StudyError::generation("upstream 503")));
        let (gateway, metrics) = gateway(backend.clone(), DEFAULT_MAX_DOCUMENT_CHARS);

        let err = gateway.explain_answer("Q", "A").await.unwrap_err();

        assert_eq!(err.http_status_code(), 500);
        assert_eq!(backend.prompts.lock().unwrap().len(), 1);
        assert_eq!(metrics.generation_requests.with_label_values(&["explain"]).get(), 1);
        assert_eq!(metrics.generation_failures.with_label_values(&["explain"]).get(), 1);
    }
}
