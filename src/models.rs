use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single term/definition pair pulled from a Quizlet set.
/// `term` becomes the question text, `definition` the correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub term: String,
    pub definition: String,
}

/// Normalized result of validating a Quizlet payload.
/// Consumed once by the generation pipeline; never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub id: String,
    pub title: String,
    pub flashcards: Vec<Flashcard>,
}

/// One fully generated question: the flashcard pair plus exactly three
/// AI-generated incorrect options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

/// Generation provenance stored as JSON in `quiz_questions.metadata`.
/// Keeps the exact prompt so a question's answers can be regenerated later
/// under comparable conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionMetadata {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regenerated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Draft,
    Published,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Draft => "draft",
            QuizStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(QuizStatus::Draft),
            "published" => Some(QuizStatus::Published),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuizStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an answer's text came from. `Quizlet` marks the verbatim definition,
/// `Ai` a generated distractor, `AiEdited` a distractor later touched by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerSource {
    #[serde(rename = "quizlet")]
    Quizlet,
    #[serde(rename = "ai")]
    Ai,
    #[serde(rename = "ai-edited")]
    AiEdited,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Quizlet => "quizlet",
            AnswerSource::Ai => "ai",
            AnswerSource::AiEdited => "ai-edited",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "quizlet" => Some(AnswerSource::Quizlet),
            "ai" => Some(AnswerSource::Ai),
            "ai-edited" => Some(AnswerSource::AiEdited),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRecord {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub status: QuizStatus,
    pub source_url: String,
    pub quizlet_set_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question_text: String,
    pub metadata: Option<QuestionMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub id: Uuid,
    pub question_id: Uuid,
    pub answer_text: String,
    pub is_correct: bool,
    pub source: AnswerSource,
    pub created_at: DateTime<Utc>,
}

/// Response body for a successful generation run. Carries the question count
/// so the caller does not need a second read round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: Uuid,
    pub title: String,
    pub status: QuizStatus,
    pub source_url: String,
    pub quizlet_set_id: String,
    pub question_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A question with its answers, as returned by the regeneration endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDetail {
    pub id: Uuid,
    pub question_text: String,
    pub metadata: Option<QuestionMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerView {
    pub id: Uuid,
    pub answer_text: String,
    pub is_correct: bool,
    pub source: AnswerSource,
}

impl AnswerView {
    pub fn from_record(record: &AnswerRecord) -> Self {
        AnswerView {
            id: record.id,
            answer_text: record.answer_text.clone(),
            is_correct: record.is_correct,
            source: record.source,
        }
    }
}

/// Request body for POST /generate.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateQuizRequest {
    pub source_url: String,
    pub title: Option<String>,
    pub manual_payload: Option<serde_json::Value>,
}

/// Request body for POST /questions/{id}/regenerate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegenerateAnswersRequest {
    pub temperature: Option<f32>,
    pub seed: Option<i64>,
}
