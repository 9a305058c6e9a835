use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::database::Database;
use crate::errors::GenerationError;
use crate::log_db_operation;
use crate::models::{
    AnswerRecord, AnswerSource, GeneratedQuestion, QuestionMetadata, QuestionRecord, QuizRecord,
    QuizStatus, QuizSummary,
};

/// One question ready for persistence: the generated content plus the
/// provenance metadata recorded alongside it.
#[derive(Debug, Clone)]
pub struct QuestionToPersist {
    pub question: GeneratedQuestion,
    pub metadata: QuestionMetadata,
}

#[derive(Debug, Clone)]
pub struct PersistQuizInput {
    pub title: String,
    pub source_url: String,
    pub quizlet_set_id: String,
    pub owner: String,
    pub questions: Vec<QuestionToPersist>,
}

/// Writes a generated quiz across the three tables with all-or-nothing
/// semantics. The store exposes no multi-statement transaction here, so
/// failure handling is compensation: any error after the quiz header exists
/// deletes the whole tree before the error is surfaced.
#[derive(Clone)]
pub struct QuizPersister {
    db: Database,
}

impl QuizPersister {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn persist(&self, input: PersistQuizInput) -> Result<QuizSummary, GenerationError> {
        let now = Utc::now();
        let quiz = QuizRecord {
            id: Uuid::new_v4(),
            user_id: input.owner,
            title: input.title,
            // New quizzes always start as drafts; publishing happens later.
            status: QuizStatus::Draft,
            source_url: input.source_url,
            quizlet_set_id: input.quizlet_set_id,
            created_at: now,
            updated_at: now,
        };

        // Header first: questions reference it, and a failure here needs no
        // compensation.
        self.db.insert_quiz(&quiz).await.map_err(|e| {
            log_db_operation!(error, "insert_quiz", error = e);
            GenerationError::Database(e)
        })?;
        log_db_operation!(debug, "insert_quiz", quiz_id = quiz.id);

        let question_count = input.questions.len();

        for entry in input.questions {
            if let Err(e) = self.write_question(quiz.id, entry).await {
                self.rollback(quiz.id).await;
                return Err(e);
            }
        }

        info!(
            quiz_id = %quiz.id,
            question_count = question_count,
            "Quiz persisted"
        );

        Ok(QuizSummary {
            id: quiz.id,
            title: quiz.title,
            status: quiz.status,
            source_url: quiz.source_url,
            quizlet_set_id: quiz.quizlet_set_id,
            question_count,
            created_at: quiz.created_at,
            updated_at: quiz.updated_at,
        })
    }

    /// Inserts one question row and its four answers (the verbatim definition
    /// plus three generated distractors) in a single batched write.
    async fn write_question(
        &self,
        quiz_id: Uuid,
        entry: QuestionToPersist,
    ) -> Result<(), GenerationError> {
        let now = Utc::now();
        let question = QuestionRecord {
            id: Uuid::new_v4(),
            quiz_id,
            question_text: entry.question.question,
            metadata: Some(entry.metadata),
            created_at: now,
            updated_at: now,
        };

        self.db.insert_question(&question).await.map_err(|e| {
            log_db_operation!(error, "insert_question", error = e);
            GenerationError::Database(e)
        })?;

        let mut answers = Vec::with_capacity(4);
        answers.push(AnswerRecord {
            id: Uuid::new_v4(),
            question_id: question.id,
            answer_text: entry.question.correct_answer,
            is_correct: true,
            source: AnswerSource::Quizlet,
            created_at: now,
        });
        for incorrect in entry.question.incorrect_answers {
            answers.push(AnswerRecord {
                id: Uuid::new_v4(),
                question_id: question.id,
                answer_text: incorrect,
                is_correct: false,
                source: AnswerSource::Ai,
                created_at: now,
            });
        }

        self.db.insert_answers(&answers).await.map_err(|e| {
            log_db_operation!(error, "insert_answers", error = e);
            GenerationError::Database(e)
        })?;

        Ok(())
    }

    /// Compensating delete after a partial write. A rollback failure is
    /// logged but must not mask the original write error.
    async fn rollback(&self, quiz_id: Uuid) {
        match self.db.delete_quiz_tree(quiz_id).await {
            Ok(()) => {
                info!(quiz_id = %quiz_id, "Rolled back partially written quiz");
            }
            Err(e) => {
                error!(
                    quiz_id = %quiz_id,
                    error = %e,
                    "Rollback after partial quiz write failed; orphaned rows may remain"
                );
            }
        }
    }
}
