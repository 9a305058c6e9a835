pub mod api;
pub mod config;
pub mod database;
pub mod distractor_service;
pub mod errors;
pub mod llm_provider;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod persister;
pub mod response_validator;
pub mod scraper;
pub mod set_locator;

pub use config::Config;
pub use database::Database;
pub use distractor_service::{DistractorService, QuizDraft};
pub use errors::*;
pub use llm_provider::{GeminiClient, JsonResponseParser};
pub use models::*;
pub use orchestrator::{GenerationMode, GenerationOrchestrator, GenerationStage};
pub use persister::{PersistQuizInput, QuestionToPersist, QuizPersister};
pub use scraper::FlashcardScraper;
pub use set_locator::SetLocation;
