use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    AnswerRecord, AnswerSource, QuestionMetadata, QuestionRecord, QuizRecord, QuizStatus,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Foreign keys are off by default in SQLite; the answers/questions
        // constraints depend on them.
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quizzes (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                source_url TEXT NOT NULL,
                quizlet_set_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quiz_questions (
                id TEXT PRIMARY KEY,
                quiz_id TEXT NOT NULL,
                question_text TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS answers (
                id TEXT PRIMARY KEY,
                question_id TEXT NOT NULL,
                answer_text TEXT NOT NULL CHECK (answer_text <> ''),
                is_correct INTEGER NOT NULL,
                source TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (question_id) REFERENCES quiz_questions(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Quiz operations

    pub async fn insert_quiz(&self, quiz: &QuizRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO quizzes (id, user_id, title, status, source_url, quizlet_set_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(quiz.id.to_string())
        .bind(&quiz.user_id)
        .bind(&quiz.title)
        .bind(quiz.status.as_str())
        .bind(&quiz.source_url)
        .bind(&quiz.quizlet_set_id)
        .bind(quiz.created_at.to_rfc3339())
        .bind(quiz.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_quiz(&self, quiz_id: Uuid) -> Result<Option<QuizRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM quizzes WHERE id = ?1")
            .bind(quiz_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_quiz(&row)).transpose()
    }

    pub async fn count_quizzes_for_user(&self, user_id: &str) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM quizzes WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("n"))
    }

    /// Removes a quiz and every question/answer row under it. The schema
    /// declares ON DELETE CASCADE, but the rollback path does not lean on it:
    /// children are deleted explicitly, leaves first.
    pub async fn delete_quiz_tree(&self, quiz_id: Uuid) -> Result<(), sqlx::Error> {
        let quiz_id = quiz_id.to_string();

        sqlx::query(
            "DELETE FROM answers WHERE question_id IN (SELECT id FROM quiz_questions WHERE quiz_id = ?1)",
        )
        .bind(&quiz_id)
        .execute(&self.pool)
        .await?;

        sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = ?1")
            .bind(&quiz_id)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM quizzes WHERE id = ?1")
            .bind(&quiz_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // Question operations

    pub async fn insert_question(&self, question: &QuestionRecord) -> Result<(), sqlx::Error> {
        let metadata_json = question
            .metadata
            .as_ref()
            .map(|m| serde_json::to_string(m))
            .transpose()
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            r#"
            INSERT INTO quiz_questions (id, quiz_id, question_text, metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(question.id.to_string())
        .bind(question.quiz_id.to_string())
        .bind(&question.question_text)
        .bind(metadata_json)
        .bind(question.created_at.to_rfc3339())
        .bind(question.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_question(&self, question_id: Uuid) -> Result<Option<QuestionRecord>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM quiz_questions WHERE id = ?1")
            .bind(question_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_question(&row)).transpose()
    }

    pub async fn get_questions_for_quiz(
        &self,
        quiz_id: Uuid,
    ) -> Result<Vec<QuestionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM quiz_questions WHERE quiz_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(quiz_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_question).collect()
    }

    pub async fn update_question_metadata(
        &self,
        question_id: Uuid,
        metadata: &QuestionMetadata,
        updated_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let metadata_json =
            serde_json::to_string(metadata).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query("UPDATE quiz_questions SET metadata = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(metadata_json)
            .bind(updated_at.to_rfc3339())
            .bind(question_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn count_questions_for_quiz(&self, quiz_id: Uuid) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM quiz_questions WHERE quiz_id = ?1")
            .bind(quiz_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("n"))
    }

    // Answer operations

    /// Inserts a question's answers as one multi-row statement.
    pub async fn insert_answers(&self, answers: &[AnswerRecord]) -> Result<(), sqlx::Error> {
        if answers.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO answers (id, question_id, answer_text, is_correct, source, created_at) ",
        );

        builder.push_values(answers.iter(), |mut b, answer| {
            b.push_bind(answer.id.to_string())
                .push_bind(answer.question_id.to_string())
                .push_bind(&answer.answer_text)
                .push_bind(answer.is_correct)
                .push_bind(answer.source.as_str())
                .push_bind(answer.created_at.to_rfc3339());
        });

        builder.build().execute(&self.pool).await?;

        Ok(())
    }

    pub async fn get_answers_for_question(
        &self,
        question_id: Uuid,
    ) -> Result<Vec<AnswerRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM answers WHERE question_id = ?1 ORDER BY is_correct DESC, created_at ASC, id ASC",
        )
        .bind(question_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_answer).collect()
    }

    pub async fn delete_incorrect_answers(&self, question_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM answers WHERE question_id = ?1 AND is_correct = 0")
            .bind(question_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn count_answers_for_quiz(&self, quiz_id: Uuid) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM answers
            WHERE question_id IN (SELECT id FROM quiz_questions WHERE quiz_id = ?1)
            "#,
        )
        .bind(quiz_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("n"))
    }
}

fn row_to_quiz(row: &SqliteRow) -> Result<QuizRecord, sqlx::Error> {
    let status_str: String = row.get("status");
    let status = QuizStatus::parse(&status_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown quiz status '{}'", status_str).into())
    })?;

    Ok(QuizRecord {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        user_id: row.get("user_id"),
        title: row.get("title"),
        status,
        source_url: row.get("source_url"),
        quizlet_set_id: row.get("quizlet_set_id"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_question(row: &SqliteRow) -> Result<QuestionRecord, sqlx::Error> {
    // Unreadable metadata degrades to None rather than failing the read; the
    // question itself is still usable.
    let metadata = row
        .get::<Option<String>, _>("metadata")
        .and_then(|raw| match serde_json::from_str::<QuestionMetadata>(&raw) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(error = %e, "Failed to parse question metadata");
                None
            }
        });

    Ok(QuestionRecord {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        quiz_id: parse_uuid(&row.get::<String, _>("quiz_id"))?,
        question_text: row.get("question_text"),
        metadata,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_answer(row: &SqliteRow) -> Result<AnswerRecord, sqlx::Error> {
    let source_str: String = row.get("source");
    let source = AnswerSource::parse(&source_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown answer source '{}'", source_str).into())
    })?;

    Ok(AnswerRecord {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        question_id: parse_uuid(&row.get::<String, _>("question_id"))?,
        answer_text: row.get("answer_text"),
        is_correct: row.get::<bool, _>("is_correct"),
        source,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn parse_uuid(value: &str) -> Result<Uuid, sqlx::Error> {
    Uuid::parse_str(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
