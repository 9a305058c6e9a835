use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::GenerationError;

/// Gemini provider client. Carries its own HTTP client plus the base URL and
/// model overrides; tests point `base_url` at a local mock endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

/// Gemini-specific request structures
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "topK")]
    top_k: i32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: i32,
    /// Asking for JSON output directly cuts down on fenced-markdown replies.
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPromptFeedback {
    #[serde(rename = "blockReason", default)]
    block_reason: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            model: model.unwrap_or_else(|| "gemini-2.0-flash".to_string()),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// One provider round trip. Distinguishes provider-side content blocking
    /// from other failures so the caller can surface them separately.
    pub async fn make_request(
        &self,
        system_message: Option<&str>,
        prompt: &str,
        temperature: f32,
        seed: Option<i64>,
    ) -> Result<String, GenerationError> {
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: system_message.map(|text| GeminiContent {
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature,
                top_k: 40,
                top_p: 0.9,
                max_output_tokens: 8192,
                response_mime_type: "application/json".to_string(),
                seed,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        info!(
            model = %self.model,
            base_url = %self.base_url,
            prompt_length = prompt.len(),
            temperature = temperature,
            "Making AI provider request"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationError::AiGenerationFailed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                model = %self.model,
                status = %status,
                error = %error_text,
                "AI provider request failed"
            );
            return Err(GenerationError::AiGenerationFailed(format!(
                "provider returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::AiGenerationFailed(format!("unreadable response: {}", e)))?;

        let content = extract_response_text(gemini_response)?;

        info!(
            model = %self.model,
            response_length = content.len(),
            "Successfully received AI provider response"
        );

        Ok(content)
    }
}

/// Pulls the first candidate's text out of a provider response, mapping the
/// blocked and empty cases to their own error kinds.
fn extract_response_text(response: GeminiResponse) -> Result<String, GenerationError> {
    if let Some(feedback) = &response.prompt_feedback {
        if let Some(reason) = &feedback.block_reason {
            return Err(GenerationError::ContentBlocked(reason.clone()));
        }
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::AiGenerationFailed("no candidates in response".to_string()))?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(GenerationError::ContentBlocked("SAFETY".to_string()));
    }

    let text = candidate
        .content
        .and_then(|content| content.parts.into_iter().next())
        .map(|part| part.text)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GenerationError::AiGenerationFailed(
            "empty response from provider".to_string(),
        ));
    }

    Ok(text)
}

/// Centralized JSON response parser with robust extraction logic
#[derive(Debug, Clone, Copy)]
pub struct JsonResponseParser;

impl JsonResponseParser {
    /// Extract JSON from responses that might be wrapped in markdown fences
    /// despite the JSON mime-type request.
    pub fn extract_json_from_response(content: &str) -> String {
        if let Some(start) = content.find("```json") {
            if let Some(end) = content[start + 7..].find("```") {
                let json_start = start + 7;
                let json_end = json_start + end;
                return content[json_start..json_end].trim().to_string();
            }
        }

        if let Some(start) = content.find("```") {
            if let Some(end) = content[start + 3..].find("```") {
                let json_start = start + 3;
                let json_end = json_start + end;
                let potential_json = content[json_start..json_end].trim();
                if potential_json.starts_with('{') || potential_json.starts_with('[') {
                    return potential_json.to_string();
                }
            }
        }

        if let Some(start) = content.find('{') {
            if let Some(end) = content.rfind('}') {
                if end > start {
                    return content[start..=end].to_string();
                }
            }
        }

        content.trim().to_string()
    }

    /// Parse a provider reply into a typed value. Parse failures are
    /// `InvalidResponseData`: the provider answered, but not in the shape we
    /// contracted for.
    pub fn parse_json_response<T>(&self, content: &str) -> Result<T, GenerationError>
    where
        T: serde::de::DeserializeOwned,
    {
        let json_content = Self::extract_json_from_response(content);
        serde_json::from_str::<T>(&json_content).map_err(|e| {
            GenerationError::InvalidResponseData(format!("response is not valid JSON: {}", e))
        })
    }
}
