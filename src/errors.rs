use axum::{http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A single structural problem found while validating an external payload.
/// `path` points at the offending field (e.g. `responses[0].models.studiableItem[2].cardSides`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaViolation {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Every failure the generation pipeline can produce. Each stage returns the
/// variant it owns; nothing upstream downgrades or reclassifies, so the
/// boundary mapping below is the single source of truth for wire codes and
/// HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Invalid Quizlet URL: {0}")]
    InvalidSourceUrl(String),

    #[error("Quizlet set {set_id} not found")]
    SetNotFound { set_id: String },

    #[error("Quizlet set {set_id} is private")]
    SetPrivate { set_id: String },

    #[error("Quizlet set contains no flashcards")]
    SetEmpty,

    #[error("Quizlet response did not match the expected shape")]
    DataValidation {
        violations: Vec<SchemaViolation>,
        raw: serde_json::Value,
    },

    /// Automated retrieval failed in a way the caller can recover from by
    /// fetching `api_url` manually and re-posting the payload.
    #[error("Automated Quizlet retrieval failed: {reason}")]
    ScraperFailed { reason: String, api_url: String },

    #[error("AI provider blocked the request: {0}")]
    ContentBlocked(String),

    #[error("AI response failed validation: {0}")]
    InvalidResponseData(String),

    #[error("AI generation failed: {0}")]
    AiGenerationFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database operation failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire format for all error responses: `{ "error": { code, message, details? } }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GenerationError {
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::InvalidSourceUrl(_) => "INVALID_SOURCE_URL",
            GenerationError::SetNotFound { .. } => "SET_NOT_FOUND",
            GenerationError::SetPrivate { .. } => "SET_PRIVATE",
            GenerationError::SetEmpty => "SET_EMPTY",
            GenerationError::DataValidation { .. } => "DATA_VALIDATION_ERROR",
            GenerationError::ScraperFailed { .. } => "SCRAPER_FAILED",
            GenerationError::ContentBlocked(_) => "CONTENT_BLOCKED",
            GenerationError::InvalidResponseData(_) => "INVALID_RESPONSE_DATA",
            GenerationError::AiGenerationFailed(_) => "AI_GENERATION_FAILED",
            GenerationError::NotFound(_) => "NOT_FOUND",
            GenerationError::Database(_) => "DATABASE_ERROR",
            GenerationError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GenerationError::InvalidSourceUrl(_) => StatusCode::BAD_REQUEST,
            GenerationError::SetNotFound { .. } => StatusCode::NOT_FOUND,
            GenerationError::SetPrivate { .. } => StatusCode::FORBIDDEN,
            GenerationError::SetEmpty => StatusCode::UNPROCESSABLE_ENTITY,
            GenerationError::DataValidation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            // Recoverable: the caller is expected to retry with a manual payload.
            GenerationError::ScraperFailed { .. } => StatusCode::FAILED_DEPENDENCY,
            GenerationError::ContentBlocked(_) => StatusCode::BAD_GATEWAY,
            GenerationError::InvalidResponseData(_) => StatusCode::BAD_GATEWAY,
            GenerationError::AiGenerationFailed(_) => StatusCode::BAD_GATEWAY,
            GenerationError::NotFound(_) => StatusCode::NOT_FOUND,
            GenerationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GenerationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable context attached to the wire error. `SCRAPER_FAILED`
    /// must carry the raw data-endpoint URL so the manual-paste fallback can
    /// fetch it.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GenerationError::SetNotFound { set_id } | GenerationError::SetPrivate { set_id } => {
                Some(json!({ "setId": set_id }))
            }
            GenerationError::DataValidation { violations, .. } => {
                Some(json!({ "violations": violations }))
            }
            GenerationError::ScraperFailed { api_url, .. } => Some(json!({ "apiUrl": api_url })),
            _ => None,
        }
    }

    /// True for failures of external collaborators or our own code; these are
    /// logged at error level, user-correctable problems only at warn/info.
    fn is_server_fault(&self) -> bool {
        matches!(
            self,
            GenerationError::ContentBlocked(_)
                | GenerationError::InvalidResponseData(_)
                | GenerationError::AiGenerationFailed(_)
                | GenerationError::Database(_)
                | GenerationError::Internal(_)
        )
    }

    /// Convert to the boundary response, logging with the request's
    /// correlation id at a severity matched to the error class.
    pub fn to_error_response(
        &self,
        correlation_id: Uuid,
    ) -> (StatusCode, Json<ErrorResponse>) {
        if self.is_server_fault() {
            error!(
                correlation_id = %correlation_id,
                code = self.code(),
                error = %self,
                "Generation pipeline failed"
            );
        } else if matches!(self, GenerationError::ScraperFailed { .. }) {
            warn!(
                correlation_id = %correlation_id,
                code = self.code(),
                error = %self,
                "Automated retrieval failed; manual fallback available"
            );
        } else {
            info!(
                correlation_id = %correlation_id,
                code = self.code(),
                error = %self,
                "Generation request rejected"
            );
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: ErrorBody {
                    code: self.code().to_string(),
                    message: self.to_string(),
                    details: self.details(),
                },
            }),
        )
    }
}
