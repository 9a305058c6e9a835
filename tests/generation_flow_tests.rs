mod common;

use std::time::Duration;

use quiz_generator::{GenerateQuizRequest, GenerationError, GenerationMode, QuizStatus};
use serde_json::json;
use uuid::Uuid;

use common::{
    batch_draft_for, build_pipeline, quizlet_payload, single_distractors, spawn_mock_gemini,
    MockAi, BIOLOGY_CARDS,
};

const SOURCE_URL: &str = "https://quizlet.com/123456789/biology-flash-cards/";

fn manual_request(payload: serde_json::Value) -> GenerateQuizRequest {
    GenerateQuizRequest {
        source_url: SOURCE_URL.to_string(),
        title: None,
        manual_payload: Some(payload),
    }
}

#[tokio::test]
async fn test_batch_mode_happy_path_produces_full_quiz() {
    let base_url = spawn_mock_gemini(MockAi::Json(batch_draft_for(&BIOLOGY_CARDS))).await;
    let (orchestrator, _, db) =
        build_pipeline(base_url, Duration::from_secs(5), GenerationMode::Batch).await;

    let summary = orchestrator
        .generate(
            manual_request(quizlet_payload(&BIOLOGY_CARDS)),
            "user-1".to_string(),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

    assert_eq!(summary.question_count, 5);
    assert_eq!(summary.status, QuizStatus::Draft);
    // Caller gave no title, so the slug-derived guess wins over the AI title.
    assert_eq!(summary.title, "Biology");
    assert_eq!(summary.quizlet_set_id, "123456789");

    let questions = db.get_questions_for_quiz(summary.id).await.unwrap();
    assert_eq!(questions.len(), 5);

    for (question, (term, definition)) in questions.iter().zip(BIOLOGY_CARDS.iter()) {
        assert_eq!(question.question_text, *term);

        let answers = db.get_answers_for_question(question.id).await.unwrap();
        assert_eq!(answers.len(), 4);
        assert_eq!(answers.iter().filter(|a| a.is_correct).count(), 1);
        assert_eq!(
            answers.iter().find(|a| a.is_correct).unwrap().answer_text,
            *definition
        );
    }
}

#[tokio::test]
async fn test_per_question_mode_produces_one_question_per_flashcard() {
    let base_url = spawn_mock_gemini(MockAi::Json(single_distractors())).await;
    let (orchestrator, _, db) = build_pipeline(
        base_url,
        Duration::from_secs(5),
        GenerationMode::PerQuestion { concurrency: 4 },
    )
    .await;

    let summary = orchestrator
        .generate(
            manual_request(quizlet_payload(&BIOLOGY_CARDS)),
            "user-1".to_string(),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

    assert_eq!(summary.question_count, 5);

    // Order must survive the bounded fan-out.
    let questions = db.get_questions_for_quiz(summary.id).await.unwrap();
    let texts: Vec<_> = questions.iter().map(|q| q.question_text.as_str()).collect();
    let expected: Vec<_> = BIOLOGY_CARDS.iter().map(|(term, _)| *term).collect();
    assert_eq!(texts, expected);

    // Each question carries its own provenance.
    for question in &questions {
        let metadata = question.metadata.as_ref().unwrap();
        assert_eq!(metadata.model, "gemini-2.0-flash");
        assert!(metadata.prompt.contains(&question.question_text));
    }
}

#[tokio::test]
async fn test_caller_title_overrides_slug_guess() {
    let base_url = spawn_mock_gemini(MockAi::Json(batch_draft_for(&BIOLOGY_CARDS))).await;
    let (orchestrator, _, _db) =
        build_pipeline(base_url, Duration::from_secs(5), GenerationMode::Batch).await;

    let mut request = manual_request(quizlet_payload(&BIOLOGY_CARDS));
    request.title = Some("Midterm Review".to_string());

    let summary = orchestrator
        .generate(request, "user-1".to_string(), Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(summary.title, "Midterm Review");
}

#[tokio::test]
async fn test_invalid_url_fails_before_any_stage_runs() {
    // No mock provider at all: a URL failure must never reach the network.
    let (orchestrator, _, db) = build_pipeline(
        "http://127.0.0.1:1".to_string(),
        Duration::from_secs(1),
        GenerationMode::Batch,
    )
    .await;

    let request = GenerateQuizRequest {
        source_url: "https://example.com/123/not-quizlet/".to_string(),
        title: None,
        manual_payload: None,
    };

    let result = orchestrator
        .generate(request, "user-1".to_string(), Uuid::new_v4())
        .await;

    assert!(matches!(result, Err(GenerationError::InvalidSourceUrl(_))));
    assert_eq!(db.count_quizzes_for_user("user-1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_set_aborts_without_quiz_row() {
    let base_url = spawn_mock_gemini(MockAi::Json(batch_draft_for(&BIOLOGY_CARDS))).await;
    let (orchestrator, _, db) =
        build_pipeline(base_url, Duration::from_secs(5), GenerationMode::Batch).await;

    let result = orchestrator
        .generate(
            manual_request(quizlet_payload(&[])),
            "user-1".to_string(),
            Uuid::new_v4(),
        )
        .await;

    assert!(matches!(result, Err(GenerationError::SetEmpty)));
    assert_eq!(db.count_quizzes_for_user("user-1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_payload_reports_violations() {
    let base_url = spawn_mock_gemini(MockAi::Json(batch_draft_for(&BIOLOGY_CARDS))).await;
    let (orchestrator, _, _db) =
        build_pipeline(base_url, Duration::from_secs(5), GenerationMode::Batch).await;

    let result = orchestrator
        .generate(
            manual_request(json!({ "unexpected": true })),
            "user-1".to_string(),
            Uuid::new_v4(),
        )
        .await;

    match result {
        Err(GenerationError::DataValidation { violations, .. }) => {
            assert!(!violations.is_empty());
            assert_eq!(violations[0].path, "responses");
        }
        other => panic!("expected DataValidation, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_provider_outage_leaves_no_rows() {
    let base_url = spawn_mock_gemini(MockAi::Http500).await;
    let (orchestrator, _, db) =
        build_pipeline(base_url, Duration::from_secs(5), GenerationMode::Batch).await;

    let result = orchestrator
        .generate(
            manual_request(quizlet_payload(&BIOLOGY_CARDS)),
            "user-1".to_string(),
            Uuid::new_v4(),
        )
        .await;

    assert!(matches!(result, Err(GenerationError::AiGenerationFailed(_))));
    assert_eq!(db.count_quizzes_for_user("user-1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_provider_timeout_is_generation_failure_with_no_rows() {
    let base_url = spawn_mock_gemini(MockAi::Delayed(
        Duration::from_secs(10),
        batch_draft_for(&BIOLOGY_CARDS),
    ))
    .await;
    let (orchestrator, _, db) =
        build_pipeline(base_url, Duration::from_millis(300), GenerationMode::Batch).await;

    let result = orchestrator
        .generate(
            manual_request(quizlet_payload(&BIOLOGY_CARDS)),
            "user-1".to_string(),
            Uuid::new_v4(),
        )
        .await;

    match result {
        Err(GenerationError::AiGenerationFailed(reason)) => {
            assert!(reason.contains("deadline"));
        }
        other => panic!("expected AiGenerationFailed, got {:?}", other.map(|_| ())),
    }
    assert_eq!(db.count_quizzes_for_user("user-1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_blocked_prompt_surfaces_as_content_blocked() {
    let base_url = spawn_mock_gemini(MockAi::Blocked).await;
    let (orchestrator, _, _db) =
        build_pipeline(base_url, Duration::from_secs(5), GenerationMode::Batch).await;

    let result = orchestrator
        .generate(
            manual_request(quizlet_payload(&BIOLOGY_CARDS)),
            "user-1".to_string(),
            Uuid::new_v4(),
        )
        .await;

    assert!(matches!(result, Err(GenerationError::ContentBlocked(_))));
}

#[tokio::test]
async fn test_wrong_distractor_count_is_rejected() {
    let base_url = spawn_mock_gemini(MockAi::Json(json!({
        "incorrectAnswers": ["only", "two"]
    })))
    .await;
    let (orchestrator, _, db) = build_pipeline(
        base_url,
        Duration::from_secs(5),
        GenerationMode::PerQuestion { concurrency: 2 },
    )
    .await;

    let result = orchestrator
        .generate(
            manual_request(quizlet_payload(&BIOLOGY_CARDS)),
            "user-1".to_string(),
            Uuid::new_v4(),
        )
        .await;

    assert!(matches!(result, Err(GenerationError::InvalidResponseData(_))));
    assert_eq!(db.count_quizzes_for_user("user-1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_unparseable_provider_reply_is_invalid_response_data() {
    let base_url =
        spawn_mock_gemini(MockAi::RawText("I cannot help with that.".to_string())).await;
    let (orchestrator, _, _db) =
        build_pipeline(base_url, Duration::from_secs(5), GenerationMode::Batch).await;

    let result = orchestrator
        .generate(
            manual_request(quizlet_payload(&BIOLOGY_CARDS)),
            "user-1".to_string(),
            Uuid::new_v4(),
        )
        .await;

    assert!(matches!(result, Err(GenerationError::InvalidResponseData(_))));
}

#[tokio::test]
async fn test_batch_count_mismatch_is_internal_error() {
    // Draft covers only 4 of the 5 flashcards.
    let short_draft = batch_draft_for(&BIOLOGY_CARDS[..4]);
    let base_url = spawn_mock_gemini(MockAi::Json(short_draft)).await;
    let (orchestrator, _, db) =
        build_pipeline(base_url, Duration::from_secs(5), GenerationMode::Batch).await;

    let result = orchestrator
        .generate(
            manual_request(quizlet_payload(&BIOLOGY_CARDS)),
            "user-1".to_string(),
            Uuid::new_v4(),
        )
        .await;

    assert!(matches!(result, Err(GenerationError::Internal(_))));
    assert_eq!(db.count_quizzes_for_user("user-1").await.unwrap(), 0);
}
