use serde_json::Value;
use tracing::debug;

use crate::errors::{GenerationError, SchemaViolation};
use crate::log_validation;
use crate::models::{Flashcard, FlashcardSet};

/// Validates the raw `studiable-item-documents` payload and normalizes it
/// into a `FlashcardSet`. Both ingestion routes (scraper and manual paste)
/// funnel through this single entry point, so their outputs are identical
/// for identical payloads.
///
/// The walk is pure over its input: validating the same payload twice yields
/// structurally equal sets.
pub fn validate_set_payload(
    raw: &Value,
    title_guess: &str,
    set_id: &str,
) -> Result<FlashcardSet, GenerationError> {
    let mut violations: Vec<SchemaViolation> = Vec::new();
    let mut flashcards: Vec<Flashcard> = Vec::new();

    let responses = match raw.get("responses").and_then(Value::as_array) {
        Some(responses) => responses,
        None => {
            violations.push(SchemaViolation::new(
                "responses",
                "expected an array of response envelopes",
            ));
            return validation_failure(raw, violations);
        }
    };

    for (response_index, response) in responses.iter().enumerate() {
        let items_path = format!("responses[{}].models.studiableItem", response_index);

        let items = match response
            .get("models")
            .and_then(|models| models.get("studiableItem"))
            .and_then(Value::as_array)
        {
            Some(items) => items,
            None => {
                violations.push(SchemaViolation::new(items_path, "expected an array of studiable items"));
                continue;
            }
        };

        for (item_index, item) in items.iter().enumerate() {
            let sides_path = format!("{}[{}].cardSides", items_path, item_index);

            let sides = match item.get("cardSides").and_then(Value::as_array) {
                Some(sides) => sides,
                None => {
                    violations.push(SchemaViolation::new(sides_path, "expected an array of card sides"));
                    continue;
                }
            };

            if sides.len() < 2 {
                violations.push(SchemaViolation::new(
                    sides_path,
                    format!("expected two card sides, found {}", sides.len()),
                ));
                continue;
            }

            // Sides map in document order: first side is the term, second the
            // definition. No reordering, no deduplication.
            let term = side_text(&sides[0], &format!("{}[0]", sides_path), &mut violations);
            let definition = side_text(&sides[1], &format!("{}[1]", sides_path), &mut violations);

            if let (Some(term), Some(definition)) = (term, definition) {
                flashcards.push(Flashcard { term, definition });
            }
        }
    }

    if !violations.is_empty() {
        return validation_failure(raw, violations);
    }

    if flashcards.is_empty() {
        return Err(GenerationError::SetEmpty);
    }

    debug!(
        set_id = %set_id,
        flashcard_count = flashcards.len(),
        "Quizlet payload validated"
    );

    Ok(FlashcardSet {
        id: set_id.to_string(),
        title: title_guess.to_string(),
        flashcards,
    })
}

/// Fallback ingestion path: a human fetched the data endpoint by hand and
/// pasted the raw JSON. Runs the exact same validation as the scraper path.
pub fn parse_manual_payload(
    raw: &Value,
    title_guess: &str,
    set_id: &str,
) -> Result<FlashcardSet, GenerationError> {
    if !raw.is_object() {
        return Err(GenerationError::DataValidation {
            violations: vec![SchemaViolation::new("$", "manual payload must be a JSON object")],
            raw: raw.clone(),
        });
    }

    validate_set_payload(raw, title_guess, set_id)
}

/// Extracts the primary text of one card side: the first media entry carrying
/// a non-empty `plainText` value.
fn side_text(side: &Value, path: &str, violations: &mut Vec<SchemaViolation>) -> Option<String> {
    let media = match side.get("media").and_then(Value::as_array) {
        Some(media) => media,
        None => {
            violations.push(SchemaViolation::new(
                format!("{}.media", path),
                "expected an array of media entries",
            ));
            return None;
        }
    };

    let text = media
        .iter()
        .filter_map(|entry| entry.get("plainText").and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty());

    match text {
        Some(text) => Some(text.to_string()),
        None => {
            violations.push(SchemaViolation::new(
                format!("{}.media", path),
                "no media entry carries non-empty plainText",
            ));
            None
        }
    }
}

fn validation_failure(
    raw: &Value,
    violations: Vec<SchemaViolation>,
) -> Result<FlashcardSet, GenerationError> {
    let err = GenerationError::DataValidation {
        violations,
        raw: raw.clone(),
    };
    log_validation!(failure, "set_payload", error = err);
    Err(err)
}
