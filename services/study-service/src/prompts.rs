//! Prompt Library
//!
//! Handlebars templates for every generation call. Built-in templates can be
//! replaced by `<name>.hbs` files in the configured prompt directory.

use handlebars::Handlebars;
use serde_json::json;
use std::path::Path;
use studyforge_utils::{StudyError, StudyResult};
use tracing::info;

pub const STUDY_ARTIFACT: &str = "study_artifact";
pub const ANSWER_QUESTION: &str = "answer_question";
pub const FLASHCARDS: &str = "flashcards";
pub const QUIZ: &str = "quiz";
pub const EXPLAIN_ANSWER: &str = "explain_answer";

const STUDY_ARTIFACT_TEMPLATE: &str = r#"You are an expert tutor. Turn the study material below into a complete study pack.

Respond with a single JSON object and nothing else. Use exactly this schema:
{
  "summary": {
    "overview": "a concise overview of the material in a few paragraphs",
    "keyPoints": ["the most important facts and ideas, one per entry"]
  },
  "flashcards": [
    { "term": "a key term or concept", "definition": "a clear, self-contained definition" }
  ],
  "quiz": [
    {
      "type": "multiple-choice | true-false | fill-in-blank",
      "question": "the question text; fill-in-blank questions mark the gap with ____",
      "options": ["four options for multiple-choice, [\"True\", \"False\"] for true-false, [] for fill-in-blank"],
      "answer": "the correct answer, matching one of the options when options are given",
      "explanation": "why the answer is correct"
    }
  ],
  "studyGuide": [
    {
      "title": "section title",
      "content": "an explanation of the topic",
      "comparisons": ["how this concept relates to or differs from others"],
      "realWorldApplications": ["where this shows up in practice"],
      "misconceptions": ["common mistakes and how to avoid them"]
    }
  ]
}

Write at least 10 flashcards and 10 quiz questions mixing all three question types.
Base everything on the material; do not invent facts it does not support.

Study material:
"""
{{document_text}}
"""
"#;

const ANSWER_QUESTION_TEMPLATE: &str = r#"You are a helpful tutor answering a student's question about their study material.
Answer using only the material below. If the material does not contain the answer, say so.

Study material:
"""
{{context}}
"""

Question: {{query}}
"#;

const FLASHCARDS_TEMPLATE: &str = r#"Create 10 new flashcards from the study material below.
Respond with a JSON array of objects of the form {"term": "...", "definition": "..."} and nothing else.

Study material:
"""
{{context}}
"""
"#;

const QUIZ_TEMPLATE: &str = r#"Create 10 new quiz questions from the study material below, mixing multiple-choice, true-false and fill-in-blank questions.
Respond with a JSON array and nothing else. Each entry has the form
{"type": "multiple-choice | true-false | fill-in-blank", "question": "...", "options": ["..."], "answer": "...", "explanation": "..."}.

Study material:
"""
{{context}}
"""
"#;

const EXPLAIN_ANSWER_TEMPLATE: &str = r#"A student is reviewing a quiz question. Explain clearly and briefly why the given answer is correct, and mention the misconception that most often leads to a wrong answer.

Question: {{question}}
Correct answer: {{correct_answer}}
"#;

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (STUDY_ARTIFACT, STUDY_ARTIFACT_TEMPLATE),
    (ANSWER_QUESTION, ANSWER_QUESTION_TEMPLATE),
    (FLASHCARDS, FLASHCARDS_TEMPLATE),
    (QUIZ, QUIZ_TEMPLATE),
    (EXPLAIN_ANSWER, EXPLAIN_ANSWER_TEMPLATE),
];

/// Named prompt templates
pub struct PromptLibrary {
    handlebars: Handlebars<'static>,
}

impl PromptLibrary {
    /// Library with the built-in templates only.
    pub fn new() -> StudyResult<Self> {
        Self::with_overrides(None)
    }

    /// Built-in templates, replaced by `<name>.hbs` from `prompt_dir` where present.
    pub fn with_overrides(prompt_dir: Option<&Path>) -> StudyResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);

        for (name, builtin) in BUILTIN_TEMPLATES {
            let override_path = prompt_dir.map(|dir| dir.join(format!("{}.hbs", name)));
            let source = match override_path {
                Some(path) if path.is_file() => {
                    info!(template = name, path = %path.display(), "Using prompt override");
                    std::fs::read_to_string(&path)?
                }
                _ => builtin.to_string(),
            };

            handlebars.register_template_string(name, source).map_err(|e| {
                StudyError::configuration(format!("Invalid prompt template '{}': {}", name, e))
            })?;
        }

        Ok(Self { handlebars })
    }

    pub fn study_artifact(&self, document_text: &str) -> StudyResult<String> {
        self.render(STUDY_ARTIFACT, &json!({ "document_text": document_text }))
    }

    pub fn answer_question(&self, query: &str, context: &str) -> StudyResult<String> {
        self.render(ANSWER_QUESTION, &json!({ "query": query, "context": context }))
    }

    pub fn flashcards(&self, context: &str) -> StudyResult<String> {
        self.render(FLASHCARDS, &json!({ "context": context }))
    }

    pub fn quiz(&self, context: &str) -> StudyResult<String> {
        self.render(QUIZ, &json!({ "context": context }))
    }

    pub fn explain_answer(&self, question: &str, correct_answer: &str) -> StudyResult<String> {
        self.render(
            EXPLAIN_ANSWER,
            &json!({ "question": question, "correct_answer": correct_answer }),
        )
    }

    /// Render template with variables
    pub fn render(&self, name: &str, variables: &serde_json::Value) -> StudyResult<String> {
        Ok(self.handlebars.render(name, variables)?)
    }
}
