use axum::{
    extract::{Path, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::database::Database;
use crate::distractor_service::DistractorService;
use crate::errors::{GenerationError, SchemaViolation};
use crate::models::{
    AnswerRecord, AnswerSource, AnswerView, GenerateQuizRequest, QuestionDetail,
    RegenerateAnswersRequest,
};
use crate::orchestrator::GenerationOrchestrator;
use crate::{log_api_start, log_api_success};

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: GenerationOrchestrator,
    pub distractor_service: DistractorService,
    pub db: Database,
    pub default_user_id: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate_quiz))
        .route("/questions/:id/regenerate", post(regenerate_answers))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// POST /generate - run the full pipeline for one Quizlet set URL.
/// 201 with a QuizSummary on success; typed error body otherwise. A
/// `SCRAPER_FAILED` answer carries `details.apiUrl`: the caller fetches that
/// URL manually and retries with `manual_payload` set.
async fn generate_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateQuizRequest>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let owner = resolve_owner(&headers, &state.default_user_id);

    log_api_start!("generate_quiz", correlation_id = correlation_id);

    if let Err(e) = validate_request(&request) {
        return error_response(e, correlation_id);
    }

    match state
        .orchestrator
        .generate(request, owner, correlation_id)
        .await
    {
        Ok(summary) => {
            log_api_success!(
                "generate_quiz",
                correlation_id = correlation_id,
                quiz_id = summary.id,
                "quiz generated"
            );
            with_correlation(
                (StatusCode::CREATED, Json(summary)).into_response(),
                correlation_id,
            )
        }
        Err(e) => error_response(e, correlation_id),
    }
}

/// POST /questions/{id}/regenerate - replace a question's three incorrect
/// answers with freshly generated ones, keeping the question text and the
/// correct answer untouched.
async fn regenerate_answers(
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
    headers: HeaderMap,
    body: Option<Json<RegenerateAnswersRequest>>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let owner = resolve_owner(&headers, &state.default_user_id);
    let request = body.map(|Json(request)| request).unwrap_or_default();

    log_api_start!(
        "regenerate_answers",
        correlation_id = correlation_id,
        question_id = question_id
    );

    match run_regeneration(&state, question_id, &owner, request).await {
        Ok(detail) => {
            log_api_success!(
                "regenerate_answers",
                correlation_id = correlation_id,
                "incorrect answers regenerated"
            );
            with_correlation((StatusCode::OK, Json(detail)).into_response(), correlation_id)
        }
        Err(e) => error_response(e, correlation_id),
    }
}

async fn run_regeneration(
    state: &AppState,
    question_id: Uuid,
    owner: &str,
    request: RegenerateAnswersRequest,
) -> Result<QuestionDetail, GenerationError> {
    let question = state
        .db
        .get_question(question_id)
        .await?
        .ok_or_else(|| GenerationError::NotFound(format!("question {}", question_id)))?;

    // Ownership is checked through the parent quiz; an unowned question is
    // reported as missing rather than leaking its existence.
    let quiz = state
        .db
        .get_quiz(question.quiz_id)
        .await?
        .ok_or_else(|| GenerationError::NotFound(format!("question {}", question_id)))?;
    if quiz.user_id != owner {
        return Err(GenerationError::NotFound(format!("question {}", question_id)));
    }

    let answers = state.db.get_answers_for_question(question_id).await?;
    let correct = answers
        .iter()
        .find(|a| a.is_correct)
        .ok_or_else(|| GenerationError::Internal("question has no correct answer".to_string()))?;

    let generated = state
        .distractor_service
        .generate_incorrect_answers(
            &question.question_text,
            &correct.answer_text,
            request.temperature,
            request.seed,
        )
        .await?;

    let now = Utc::now();

    // Old distractors go first; the new ones only land after generation has
    // already succeeded, so the question is never left without options.
    state.db.delete_incorrect_answers(question_id).await?;

    let new_answers: Vec<AnswerRecord> = generated
        .incorrect_answers
        .into_iter()
        .map(|answer_text| AnswerRecord {
            id: Uuid::new_v4(),
            question_id,
            answer_text,
            is_correct: false,
            source: AnswerSource::Ai,
            created_at: now,
        })
        .collect();
    state.db.insert_answers(&new_answers).await?;

    let mut metadata = generated.metadata;
    metadata.regenerated_at = Some(now.to_rfc3339());
    state
        .db
        .update_question_metadata(question_id, &metadata, now)
        .await?;

    let answers = state.db.get_answers_for_question(question_id).await?;

    Ok(QuestionDetail {
        id: question.id,
        question_text: question.question_text,
        metadata: Some(metadata),
        created_at: question.created_at,
        updated_at: now,
        answers: answers.iter().map(AnswerView::from_record).collect(),
    })
}

/// Request-shape checks that sit in front of the pipeline. URL validation
/// itself belongs to the locator stage.
fn validate_request(request: &GenerateQuizRequest) -> Result<(), GenerationError> {
    if let Some(title) = &request.title {
        let length = title.chars().count();
        if length == 0 || length > 200 {
            return Err(GenerationError::DataValidation {
                violations: vec![SchemaViolation::new(
                    "title",
                    "title must be between 1 and 200 characters",
                )],
                raw: serde_json::Value::Null,
            });
        }
    }

    Ok(())
}

/// The session layer in front of this service sets `x-user-id`; without it,
/// quizzes are owned by the configured default user.
fn resolve_owner(headers: &HeaderMap, default_user_id: &str) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_user_id.to_string())
}

fn error_response(error: GenerationError, correlation_id: Uuid) -> Response {
    let (status, body) = error.to_error_response(correlation_id);
    with_correlation((status, body).into_response(), correlation_id)
}

fn with_correlation(mut response: Response, correlation_id: Uuid) -> Response {
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_owner_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static("alice"));

        assert_eq!(resolve_owner(&headers, "local-user"), "alice");
    }

    #[test]
    fn test_resolve_owner_falls_back_to_default() {
        let headers = HeaderMap::new();
        assert_eq!(resolve_owner(&headers, "local-user"), "local-user");

        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static(""));
        assert_eq!(resolve_owner(&headers, "local-user"), "local-user");
    }

    #[test]
    fn test_title_bounds() {
        let base = GenerateQuizRequest {
            source_url: "https://quizlet.com/123/biology-flash-cards/".to_string(),
            title: None,
            manual_payload: None,
        };

        assert!(validate_request(&base).is_ok());

        let ok = GenerateQuizRequest {
            title: Some("Biology Midterm".to_string()),
            ..base.clone()
        };
        assert!(validate_request(&ok).is_ok());

        let empty = GenerateQuizRequest {
            title: Some(String::new()),
            ..base.clone()
        };
        assert!(matches!(
            validate_request(&empty),
            Err(GenerationError::DataValidation { .. })
        ));

        let too_long = GenerateQuizRequest {
            title: Some("x".repeat(201)),
            ..base
        };
        assert!(matches!(
            validate_request(&too_long),
            Err(GenerationError::DataValidation { .. })
        ));
    }
}
