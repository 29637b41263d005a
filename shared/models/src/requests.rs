use serde::{Deserialize, Serialize};
use studyforge_utils::not_blank;
use validator::Validate;

use crate::artifact::StudyArtifact;

/// Free-form question about a study context.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct AskRequest {
    #[validate(custom(function = "not_blank", message = "Query and context are required"))]
    pub query: String,
    #[validate(custom(function = "not_blank", message = "Query and context are required"))]
    pub context: String,
}

/// Body shared by the flashcard and quiz endpoints.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ContextRequest {
    #[validate(custom(function = "not_blank", message = "Context is required"))]
    pub context: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ExplainRequest {
    #[validate(custom(function = "not_blank", message = "Question and correct answer are required"))]
    pub question: String,
    #[serde(alias = "correct_answer")]
    #[validate(custom(function = "not_blank", message = "Question and correct answer are required"))]
    pub correct_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub summary: StudyArtifact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardsResponse {
    pub flashcards: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResponse {
    pub quiz: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
}
