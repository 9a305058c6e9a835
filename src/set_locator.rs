use regex::Regex;
use std::sync::OnceLock;

use crate::errors::GenerationError;

/// Result of resolving a user-supplied Quizlet URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetLocation {
    pub set_id: String,
    pub title_guess: String,
}

/// Fallback title when the URL carries no usable slug.
const TITLE_PLACEHOLDER: &str = "Imported Quizlet Set";

/// Matches https://quizlet.com/{ll/}12345{/slug}{/...}, capturing the numeric
/// set id and the slug. The optional 2-letter segment covers localized URLs
/// such as /de/123/kapitel-eins/.
fn set_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^https://(?:www\.)?quizlet\.com/(?:[a-z]{2}/)?(\d+)(?:/([^/?#]*))?(?:[/?#].*)?$",
        )
        .expect("set URL regex is valid")
    })
}

/// Parse a Quizlet set URL into its numeric id and a human-readable title
/// guess. Pure string work; performs no network I/O.
pub fn locate(url: &str) -> Result<SetLocation, GenerationError> {
    let trimmed = url.trim();
    let captures = set_url_regex()
        .captures(trimmed)
        .ok_or_else(|| GenerationError::InvalidSourceUrl(trimmed.to_string()))?;

    let set_id = captures
        .get(1)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| GenerationError::InvalidSourceUrl(trimmed.to_string()))?;

    let title_guess = captures
        .get(2)
        .map(|m| title_from_slug(m.as_str()))
        .unwrap_or_default();

    let title_guess = if title_guess.is_empty() {
        TITLE_PLACEHOLDER.to_string()
    } else {
        title_guess
    };

    Ok(SetLocation { set_id, title_guess })
}

/// Turn a URL slug into a display title: strip the conventional
/// "-flash-cards" suffix, split on separators, title-case each word.
fn title_from_slug(slug: &str) -> String {
    let trimmed = slug.trim_end_matches('/');
    let trimmed = trimmed
        .strip_suffix("-flash-cards")
        .unwrap_or(trimmed);

    trimmed
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
