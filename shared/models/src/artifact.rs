//! Study artifact schema
//!
//! The generation backend is asked for a JSON object with a summary,
//! flashcards, a quiz and a study guide. Parsing is lenient about shape
//! (string summaries, quizzes wrapped in an object, boolean answers) but
//! strict about the payload being a JSON object carrying some content.

use serde::{Deserialize, Deserializer, Serialize};
use studyforge_utils::{StudyError, StudyResult};

/// Structured study aid produced from one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudyArtifact {
    #[serde(deserialize_with = "summary_from_any")]
    pub summary: Summary,
    pub flashcards: Vec<Flashcard>,
    #[serde(deserialize_with = "quiz_from_any")]
    pub quiz: Vec<QuizQuestion>,
    #[serde(alias = "study_guide", deserialize_with = "study_guide_from_any")]
    pub study_guide: Vec<StudySection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Summary {
    #[serde(alias = "text", alias = "content")]
    pub overview: String,
    #[serde(alias = "key_points")]
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flashcard {
    #[serde(alias = "front", alias = "question")]
    pub term: String,
    #[serde(alias = "back", alias = "answer")]
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
    FillInBlank,
    Other(String),
}

impl From<String> for QuestionType {
    fn from(value: String) -> Self {
        let key: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "multiplechoice" | "mcq" | "mc" => Self::MultipleChoice,
            "truefalse" | "tf" | "boolean" => Self::TrueFalse,
            "fillinblank" | "fillintheblank" | "fillblank" => Self::FillInBlank,
            _ => Self::Other(value),
        }
    }
}

impl From<QuestionType> for String {
    fn from(value: QuestionType) -> Self {
        match value {
            QuestionType::MultipleChoice => "multiple-choice".to_string(),
            QuestionType::TrueFalse => "true-false".to_string(),
            QuestionType::FillInBlank => "fill-in-blank".to_string(),
            QuestionType::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizQuestion {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    pub options: Vec<String>,
    #[serde(alias = "correctAnswer", alias = "correct_answer", deserialize_with = "string_from_scalar")]
    pub answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudySection {
    pub title: String,
    pub content: String,
    pub comparisons: Vec<String>,
    #[serde(alias = "real_world_applications", alias = "applications")]
    pub real_world_applications: Vec<String>,
    #[serde(alias = "commonMisconceptions")]
    pub misconceptions: Vec<String>,
}

impl StudyArtifact {
    /// Parse raw backend output into an artifact.
    pub fn parse(raw: &str) -> StudyResult<Self> {
        let payload = extract_json_object(raw)
            .ok_or_else(|| StudyError::malformed_artifact("response does not contain a JSON object"))?;

        let artifact: StudyArtifact = serde_json::from_str(payload)?;

        if artifact.is_empty() {
            return Err(StudyError::malformed_artifact(
                "response JSON has no summary, flashcards, quiz or study guide",
            ));
        }

        Ok(artifact)
    }

    pub fn is_empty(&self) -> bool {
        self.summary.overview.trim().is_empty()
            && self.summary.key_points.is_empty()
            && self.flashcards.is_empty()
            && self.quiz.is_empty()
            && self.study_guide.is_empty()
    }
}

/// Locate the JSON object in a model reply, tolerating Markdown fences and
/// chatter before or after the object.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let unfenced = match trimmed.strip_prefix("```") {
        Some(rest) => {
            // Drop the info string ("json") on the opening fence line.
            let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
            body.trim_end().strip_suffix("```").unwrap_or(body).trim()
        }
        None => trimmed,
    };

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&unfenced[start..=end])
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SummaryShape {
    Text(String),
    Structured(Summary),
}

fn summary_from_any<'de, D>(deserializer: D) -> Result<Summary, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<SummaryShape>::deserialize(deserializer)? {
        Some(SummaryShape::Text(overview)) => Summary {
            overview,
            key_points: Vec::new(),
        },
        Some(SummaryShape::Structured(summary)) => summary,
        None => Summary::default(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuizShape {
    List(Vec<QuizQuestion>),
    Wrapped {
        #[serde(default)]
        questions: Vec<QuizQuestion>,
    },
}

fn quiz_from_any<'de, D>(deserializer: D) -> Result<Vec<QuizQuestion>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<QuizShape>::deserialize(deserializer)? {
        Some(QuizShape::List(questions)) | Some(QuizShape::Wrapped { questions }) => questions,
        None => Vec::new(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StudyGuideShape {
    List(Vec<StudySection>),
    Wrapped {
        #[serde(default)]
        sections: Vec<StudySection>,
    },
}

fn study_guide_from_any<'de, D>(deserializer: D) -> Result<Vec<StudySection>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<StudyGuideShape>::deserialize(deserializer)? {
        Some(StudyGuideShape::List(sections)) | Some(StudyGuideShape::Wrapped { sections }) => sections,
        None => Vec::new(),
    })
}

fn string_from_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "summary": {"overview": "Cells convert light to energy.", "keyPoints": ["Chlorophyll absorbs light"]},
        "flashcards": [{"term": "Chloroplast", "definition": "Organelle for photosynthesis"}],
        "quiz": [
            {"type": "multiple-choice", "question": "Where?", "options": ["Chloroplast", "Nucleus"], "answer": "Chloroplast", "explanation": "It holds chlorophyll."},
            {"type": "true-false", "question": "Plants need light.", "answer": true, "explanation": "Light drives the reaction."},
            {"type": "fill-in-blank", "question": "___ is released.", "answer": "Oxygen", "explanation": "Water is split."}
        ],
        "studyGuide": [{"title": "Light reactions", "content": "Thylakoid membrane.", "comparisons": ["Light vs dark"], "realWorldApplications": ["Solar cells"], "misconceptions": ["Plants eat soil"]}]
    }"#;

    #[test]
    fn parses_the_documented_schema() {
        let artifact = StudyArtifact::parse(SAMPLE).unwrap();

        assert_eq!(artifact.summary.key_points.len(), 1);
        assert_eq!(artifact.flashcards[0].term, "Chloroplast");
        assert_eq!(artifact.quiz.len(), 3);
        assert_eq!(artifact.quiz[0].question_type, QuestionType::MultipleChoice);
        assert_eq!(artifact.quiz[1].question_type, QuestionType::TrueFalse);
        assert_eq!(artifact.quiz[1].answer, "true");
        assert_eq!(artifact.quiz[2].question_type, QuestionType::FillInBlank);
        assert_eq!(artifact.study_guide[0].real_world_applications, vec!["Solar cells"]);
    }

    #[test]
    fn strips_markdown_fences() {
        let fenced = format!("```json\n{}\n```", SAMPLE);
        assert_eq!(StudyArtifact::parse(&fenced).unwrap(), StudyArtifact::parse(SAMPLE).unwrap());
    }

    #[test]
    fn accepts_string_summary_and_wrapped_quiz() {
        let raw = r#"Here you go: {"summary": "Short.", "quiz": {"questions": [{"type": "MCQ", "question": "Q?"}]}}"#;
        let artifact = StudyArtifact::parse(raw).unwrap();

        assert_eq!(artifact.summary.overview, "Short.");
        assert_eq!(artifact.quiz[0].question_type, QuestionType::MultipleChoice);
    }

    #[test]
    fn serializes_camel_case_keys() {
        let artifact = StudyArtifact::parse(SAMPLE).unwrap();
        let value = serde_json::to_value(&artifact).unwrap();

        assert!(value.get("studyGuide").is_some());
        assert_eq!(value["quiz"][1]["type"], "true-false");
        assert!(value["summary"].get("keyPoints").is_some());
    }

    #[test]
    fn rejects_non_json_and_empty_objects() {
        let err = StudyArtifact::parse("I cannot help with that.").unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_ARTIFACT");

        let err = StudyArtifact::parse("{}").unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_ARTIFACT");

        let err = StudyArtifact::parse("{\"summary\": [1, 2]}").unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_ARTIFACT");
    }

    #[test]
    fn unknown_question_types_are_preserved() {
        let qt = QuestionType::from("matching".to_string());
        assert_eq!(String::from(qt), "matching");
    }
}
