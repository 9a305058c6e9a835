use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::info;
use uuid::Uuid;

use crate::distractor_service::DistractorService;
use crate::errors::GenerationError;
use crate::log_stage;
use crate::models::{FlashcardSet, GenerateQuizRequest, GeneratedQuestion, QuizSummary};
use crate::persister::{PersistQuizInput, QuestionToPersist, QuizPersister};
use crate::response_validator;
use crate::scraper::FlashcardScraper;
use crate::set_locator;

/// Pipeline states. Progression is strictly linear; any stage failure moves
/// to `Aborted` carrying that stage's error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Idle,
    LocatingSet,
    FetchingFlashcards,
    GeneratingDistractors,
    Persisting,
    Done,
}

impl std::fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GenerationStage::Idle => "Idle",
            GenerationStage::LocatingSet => "LocatingSet",
            GenerationStage::FetchingFlashcards => "FetchingFlashcards",
            GenerationStage::GeneratingDistractors => "GeneratingDistractors",
            GenerationStage::Persisting => "Persisting",
            GenerationStage::Done => "Done",
        };
        f.write_str(name)
    }
}

/// How the distractor stage is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// One provider call for the whole set. Default: avoids per-item rate
    /// limits during initial creation.
    Batch,
    /// One provider call per flashcard, at most `concurrency` in flight.
    PerQuestion { concurrency: usize },
}

/// Sequences the pipeline stages and forwards each stage's typed error
/// unchanged; the only thing added here is the correlation id on log lines.
/// No stage is retried at this level - retries that exist (the scraper's
/// interception-then-direct-navigation fallback) are internal to the stage.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    scraper: FlashcardScraper,
    distractors: DistractorService,
    persister: QuizPersister,
    mode: GenerationMode,
}

impl GenerationOrchestrator {
    pub fn new(
        scraper: FlashcardScraper,
        distractors: DistractorService,
        persister: QuizPersister,
        mode: GenerationMode,
    ) -> Self {
        Self {
            scraper,
            distractors,
            persister,
            mode,
        }
    }

    pub async fn generate(
        &self,
        request: GenerateQuizRequest,
        owner: String,
        correlation_id: Uuid,
    ) -> Result<QuizSummary, GenerationError> {
        let mut stage = GenerationStage::Idle;

        match self
            .run_pipeline(request, owner, correlation_id, &mut stage)
            .await
        {
            Ok(summary) => Ok(summary),
            Err(e) => {
                log_stage!(abort, stage, correlation_id = correlation_id, code = e.code());
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: GenerateQuizRequest,
        owner: String,
        correlation_id: Uuid,
        stage: &mut GenerationStage,
    ) -> Result<QuizSummary, GenerationError> {
        *stage = GenerationStage::LocatingSet;
        log_stage!(enter, stage, correlation_id = correlation_id);
        let location = set_locator::locate(&request.source_url)?;

        let title = request
            .title
            .clone()
            .unwrap_or_else(|| location.title_guess.clone());

        *stage = GenerationStage::FetchingFlashcards;
        log_stage!(enter, stage, correlation_id = correlation_id);
        let set = match &request.manual_payload {
            // Manual re-entry: a human already fetched the payload, so the
            // pipeline starts here instead of at the scraper.
            Some(raw) => response_validator::parse_manual_payload(
                raw,
                &location.title_guess,
                &location.set_id,
            )?,
            None => {
                let raw = self.scraper.scrape(&location.set_id).await?;
                response_validator::validate_set_payload(
                    &raw,
                    &location.title_guess,
                    &location.set_id,
                )?
            }
        };

        *stage = GenerationStage::GeneratingDistractors;
        log_stage!(enter, stage, correlation_id = correlation_id);
        let questions = self.generate_questions(&set, &title).await?;

        // One generated question per flashcard, in order, or the run is not
        // internally consistent and must not reach the store.
        if questions.len() != set.flashcards.len() {
            return Err(GenerationError::Internal(format!(
                "generated {} questions for {} flashcards",
                questions.len(),
                set.flashcards.len()
            )));
        }

        *stage = GenerationStage::Persisting;
        log_stage!(enter, stage, correlation_id = correlation_id);
        let summary = self
            .persister
            .persist(PersistQuizInput {
                title,
                source_url: request.source_url,
                quizlet_set_id: location.set_id,
                owner,
                questions,
            })
            .await?;

        *stage = GenerationStage::Done;
        info!(
            correlation_id = %correlation_id,
            quiz_id = %summary.id,
            question_count = summary.question_count,
            "Generation pipeline completed"
        );

        Ok(summary)
    }

    async fn generate_questions(
        &self,
        set: &FlashcardSet,
        topic: &str,
    ) -> Result<Vec<QuestionToPersist>, GenerationError> {
        match self.mode {
            GenerationMode::Batch => {
                let draft = self
                    .distractors
                    .generate_quiz_draft(&set.flashcards, topic, None, None)
                    .await?;

                if draft.questions.len() != set.flashcards.len() {
                    return Err(GenerationError::Internal(format!(
                        "batch draft has {} questions for {} flashcards",
                        draft.questions.len(),
                        set.flashcards.len()
                    )));
                }

                // The provider is asked to echo question and answer verbatim,
                // but the stored rows must carry the flashcard text exactly,
                // so only the distractors are taken from the draft.
                Ok(set
                    .flashcards
                    .iter()
                    .zip(draft.questions)
                    .map(|(card, generated)| QuestionToPersist {
                        question: GeneratedQuestion {
                            question: card.term.clone(),
                            correct_answer: card.definition.clone(),
                            incorrect_answers: generated.incorrect_answers,
                        },
                        metadata: draft.metadata.clone(),
                    })
                    .collect())
            }
            GenerationMode::PerQuestion { concurrency } => {
                let service = &self.distractors;
                stream::iter(set.flashcards.clone())
                    .map(|card| async move {
                        let generated = service
                            .generate_incorrect_answers(&card.term, &card.definition, None, None)
                            .await?;
                        Ok::<QuestionToPersist, GenerationError>(QuestionToPersist {
                            question: GeneratedQuestion {
                                question: card.term.clone(),
                                correct_answer: card.definition.clone(),
                                incorrect_answers: generated.incorrect_answers,
                            },
                            metadata: generated.metadata,
                        })
                    })
                    // `buffered` keeps results in input order, so questions
                    // line up with their flashcards.
                    .buffered(concurrency.max(1))
                    .try_collect()
                    .await
            }
        }
    }
}
