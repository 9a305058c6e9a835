use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::errors::GenerationError;
use crate::llm_provider::{GeminiClient, JsonResponseParser};
use crate::log_llm_operation;
use crate::models::{Flashcard, GeneratedQuestion, QuestionMetadata};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const REQUIRED_DISTRACTOR_COUNT: usize = 3;

const SYSTEM_MESSAGE: &str = "You are a quiz author generating plausible but incorrect \
multiple-choice options. Always respond with valid JSON in the exact requested format, \
with no commentary outside the JSON.";

/// Distractors for a single question plus the provenance recorded with it.
#[derive(Debug, Clone)]
pub struct GeneratedDistractors {
    pub incorrect_answers: Vec<String>,
    pub metadata: QuestionMetadata,
}

/// A full batch-generated quiz draft. The title is schema-checked but the
/// caller decides whether to use it.
#[derive(Debug, Clone)]
pub struct QuizDraft {
    pub title: String,
    pub questions: Vec<GeneratedQuestion>,
    pub metadata: QuestionMetadata,
}

/// Wire shape for per-question responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncorrectAnswersResponse {
    incorrect_answers: Vec<String>,
}

/// Wire shape for batch responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizDraftResponse {
    title: String,
    questions: Vec<DraftQuestionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftQuestionResponse {
    question: String,
    correct_answer: String,
    incorrect_answers: Vec<String>,
}

#[derive(Clone)]
pub struct DistractorService {
    provider: GeminiClient,
    json_parser: JsonResponseParser,
    timeout: Duration,
}

impl DistractorService {
    pub fn new(provider: GeminiClient, timeout: Duration) -> Self {
        Self {
            provider,
            json_parser: JsonResponseParser,
            timeout,
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Generate exactly three incorrect answers for one question. Used by the
    /// per-question pipeline mode and by single-question regeneration.
    pub async fn generate_incorrect_answers(
        &self,
        question: &str,
        correct_answer: &str,
        temperature: Option<f32>,
        seed: Option<i64>,
    ) -> Result<GeneratedDistractors, GenerationError> {
        let temperature = temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let prompt = build_single_prompt(question, correct_answer);

        log_llm_operation!(start, "generate_incorrect_answers", model = self.provider.model_name(), card_count = 1);
        let started = Instant::now();

        let response_text = self
            .call_with_timeout(&prompt, temperature, seed)
            .await
            .inspect_err(|e| {
                log_llm_operation!(error, "generate_incorrect_answers", model = self.provider.model_name(), error = e);
            })?;

        debug!(response_content = %response_text, "Raw AI response for distractor generation");

        let parsed: IncorrectAnswersResponse = self.json_parser.parse_json_response(&response_text)?;
        validate_distractors(&parsed.incorrect_answers)?;

        log_llm_operation!(
            success,
            "generate_incorrect_answers",
            model = self.provider.model_name(),
            duration_ms = started.elapsed().as_millis() as u64
        );

        Ok(GeneratedDistractors {
            incorrect_answers: parsed.incorrect_answers,
            metadata: QuestionMetadata {
                model: self.provider.model_name().to_string(),
                temperature: Some(temperature),
                seed,
                prompt,
                regenerated_at: None,
            },
        })
    }

    /// Generate the whole quiz in one provider call. Exists to stay under
    /// per-item provider rate limits during initial quiz creation.
    pub async fn generate_quiz_draft(
        &self,
        flashcards: &[Flashcard],
        topic: &str,
        temperature: Option<f32>,
        seed: Option<i64>,
    ) -> Result<QuizDraft, GenerationError> {
        let temperature = temperature.unwrap_or(DEFAULT_TEMPERATURE);
        let prompt = build_batch_prompt(flashcards, topic);

        log_llm_operation!(start, "generate_quiz_draft", model = self.provider.model_name(), card_count = flashcards.len());
        let started = Instant::now();

        let response_text = self
            .call_with_timeout(&prompt, temperature, seed)
            .await
            .inspect_err(|e| {
                log_llm_operation!(error, "generate_quiz_draft", model = self.provider.model_name(), error = e);
            })?;

        debug!(
            card_count = flashcards.len(),
            response_content = %response_text,
            "Raw AI response for batch quiz generation"
        );

        let parsed: QuizDraftResponse = self.json_parser.parse_json_response(&response_text)?;
        let questions = validate_draft(parsed.title.as_str(), parsed.questions)?;

        log_llm_operation!(
            success,
            "generate_quiz_draft",
            model = self.provider.model_name(),
            duration_ms = started.elapsed().as_millis() as u64
        );

        Ok(QuizDraft {
            title: parsed.title,
            questions,
            metadata: QuestionMetadata {
                model: self.provider.model_name().to_string(),
                temperature: Some(temperature),
                seed,
                prompt,
                regenerated_at: None,
            },
        })
    }

    /// Provider round trip under a hard deadline. A timeout is reported as a
    /// generation failure, same as provider-reported errors, so upstream
    /// policy can treat both uniformly.
    async fn call_with_timeout(
        &self,
        prompt: &str,
        temperature: f32,
        seed: Option<i64>,
    ) -> Result<String, GenerationError> {
        match tokio::time::timeout(
            self.timeout,
            self.provider
                .make_request(Some(SYSTEM_MESSAGE), prompt, temperature, seed),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::AiGenerationFailed(format!(
                "provider call exceeded {}s deadline",
                self.timeout.as_secs()
            ))),
        }
    }
}

fn build_single_prompt(question: &str, correct_answer: &str) -> String {
    format!(
        r#"Generate 3 plausible but incorrect answers for the following question.
Question: {question}
Correct Answer: {correct_answer}

The incorrect answers must be:
- Related to the topic
- Plausible enough to work as distractors
- Clearly wrong to someone who knows the correct answer
- Of similar length, tone and format to the correct answer
- Unambiguous to a knowledgeable reader

If the correct answer is a statement about the answer options themselves
(for example "two of these are correct"), construct the incorrect options so
that the statement stays true.

Respond with a JSON object in this exact format:
{{
    "incorrectAnswers": ["first incorrect answer", "second incorrect answer", "third incorrect answer"]
}}"#
    )
}

fn build_batch_prompt(flashcards: &[Flashcard], topic: &str) -> String {
    let card_list = flashcards
        .iter()
        .enumerate()
        .map(|(i, card)| format!("{}. Question: {} | Correct answer: {}", i + 1, card.term, card.definition))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are given the flashcards of a study set about "{topic}". For every flashcard,
keep the question and correct answer exactly as given and generate 3 plausible but
incorrect answer options. Also propose a short quiz title.

Flashcards:
{card_list}

Respond with a JSON object in this exact format:
{{
    "title": "Quiz title here",
    "questions": [
        {{
            "question": "Question text copied verbatim",
            "correctAnswer": "Correct answer copied verbatim",
            "incorrectAnswers": ["first incorrect answer", "second incorrect answer", "third incorrect answer"]
        }}
    ]
}}

Guidelines:
- Return the questions in the same order as the flashcards, one entry per flashcard
- Incorrect answers must be related to the topic and of similar length and tone to the correct answer
- Incorrect answers must be clearly wrong to someone who knows the material
- If a correct answer is a statement about the answer options themselves, construct
  the incorrect options so that the statement stays true"#
    )
}

/// Exactly three non-empty distractors; anything else is rejected, never
/// truncated or padded.
fn validate_distractors(answers: &[String]) -> Result<(), GenerationError> {
    if answers.len() != REQUIRED_DISTRACTOR_COUNT {
        return Err(GenerationError::InvalidResponseData(format!(
            "expected exactly {} incorrect answers, got {}",
            REQUIRED_DISTRACTOR_COUNT,
            answers.len()
        )));
    }

    if answers.iter().any(|answer| answer.trim().is_empty()) {
        return Err(GenerationError::InvalidResponseData(
            "incorrect answers must be non-empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_draft(
    title: &str,
    questions: Vec<DraftQuestionResponse>,
) -> Result<Vec<GeneratedQuestion>, GenerationError> {
    if title.trim().is_empty() {
        return Err(GenerationError::InvalidResponseData(
            "quiz title must be non-empty".to_string(),
        ));
    }

    if questions.is_empty() {
        return Err(GenerationError::InvalidResponseData(
            "batch response contains no questions".to_string(),
        ));
    }

    questions
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            if draft.question.trim().is_empty() || draft.correct_answer.trim().is_empty() {
                return Err(GenerationError::InvalidResponseData(format!(
                    "question {} has empty question text or correct answer",
                    index + 1
                )));
            }
            validate_distractors(&draft.incorrect_answers)?;

            Ok(GeneratedQuestion {
                question: draft.question,
                correct_answer: draft.correct_answer,
                incorrect_answers: draft.incorrect_answers,
            })
        })
        .collect()
}
