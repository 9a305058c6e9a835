//! Shared helpers for the integration suites: a mock Gemini endpoint served
//! on an ephemeral local port, Quizlet payload builders, and pipeline wiring
//! against an in-memory database.

// Each test crate uses a different subset of these helpers.
#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use std::time::Duration;

use quiz_generator::config::ScraperConfig;
use quiz_generator::{
    Database, DistractorService, FlashcardScraper, GeminiClient, GenerationMode,
    GenerationOrchestrator, QuizPersister,
};

/// What the mock provider answers with.
#[derive(Clone)]
#[allow(dead_code)]
pub enum MockAi {
    /// Candidate text is this JSON value, serialized.
    Json(Value),
    /// Candidate text is raw, unparsed text.
    RawText(String),
    /// Provider-side content filtering.
    Blocked,
    /// Provider outage.
    Http500,
    /// Sleeps before answering; pair with a short service timeout.
    Delayed(Duration, Value),
}

async fn mock_generate(State(behavior): State<MockAi>) -> Response {
    match behavior {
        MockAi::Json(value) => Json(gemini_envelope(value.to_string())).into_response(),
        MockAi::RawText(text) => Json(gemini_envelope(text)).into_response(),
        MockAi::Blocked => Json(json!({
            "candidates": [],
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .into_response(),
        MockAi::Http500 => (StatusCode::INTERNAL_SERVER_ERROR, "provider exploded").into_response(),
        MockAi::Delayed(delay, value) => {
            tokio::time::sleep(delay).await;
            Json(gemini_envelope(value.to_string())).into_response()
        }
    }
}

fn gemini_envelope(text: String) -> Value {
    json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ] }, "finishReason": "STOP" }
        ]
    })
}

/// Serve the mock provider on an ephemeral port, returning its base URL.
pub async fn spawn_mock_gemini(behavior: MockAi) -> String {
    let app = Router::new()
        .route("/models/*rest", post(mock_generate))
        .with_state(behavior);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Quizlet-shaped payload for the given term/definition pairs.
pub fn quizlet_payload(cards: &[(&str, &str)]) -> Value {
    let items: Vec<Value> = cards
        .iter()
        .map(|(term, definition)| {
            json!({
                "id": 1,
                "cardSides": [
                    { "label": "word", "media": [ { "type": 1, "plainText": term } ] },
                    { "label": "definition", "media": [ { "type": 1, "plainText": definition } ] }
                ]
            })
        })
        .collect();

    json!({ "responses": [ { "models": { "studiableItem": items } } ] })
}

pub const BIOLOGY_CARDS: [(&str, &str); 5] = [
    ("What is the powerhouse of the cell?", "Mitochondria"),
    ("What process do plants use to convert sunlight into energy?", "Photosynthesis"),
    ("What is the basic unit of life?", "Cell"),
    ("What is DNA an acronym for?", "Deoxyribonucleic Acid"),
    ("What is the process by which cells divide?", "Mitosis"),
];

/// A well-formed batch draft covering `cards`, three distractors each.
pub fn batch_draft_for(cards: &[(&str, &str)]) -> Value {
    let questions: Vec<Value> = cards
        .iter()
        .map(|(term, definition)| {
            json!({
                "question": term,
                "correctAnswer": definition,
                "incorrectAnswers": ["plausible one", "plausible two", "plausible three"]
            })
        })
        .collect();

    json!({ "title": "Biology Basics", "questions": questions })
}

pub fn single_distractors() -> Value {
    json!({ "incorrectAnswers": ["Nucleus", "Ribosome", "Chloroplast"] })
}

fn scraper_config() -> ScraperConfig {
    ScraperConfig {
        session_cookie: None,
        user_agent: "test-agent".to_string(),
        timeout_secs: 2,
    }
}

/// Wire the whole pipeline against an in-memory database and the given mock
/// provider. The scraper is present but unused when tests go through the
/// manual-payload path.
#[allow(dead_code)]
pub async fn build_pipeline(
    ai_base_url: String,
    ai_timeout: Duration,
    mode: GenerationMode,
) -> (GenerationOrchestrator, DistractorService, Database) {
    let db = Database::new("sqlite::memory:").await.unwrap();

    let gemini = GeminiClient::new(
        "test-key".to_string(),
        Some(ai_base_url),
        Some("gemini-2.0-flash".to_string()),
    );
    let distractor_service = DistractorService::new(gemini, ai_timeout);
    let scraper = FlashcardScraper::new(scraper_config());
    let persister = QuizPersister::new(db.clone());

    let orchestrator = GenerationOrchestrator::new(
        scraper,
        distractor_service.clone(),
        persister,
        mode,
    );

    (orchestrator, distractor_service, db)
}
