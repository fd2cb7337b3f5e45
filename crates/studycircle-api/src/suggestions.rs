//! Study suggestions from an OpenAI-compatible chat completion API.
//!
//! The proxy builds one of three fixed prompts, forwards it upstream and
//! hands back the reply, parsed as JSON when the model produced JSON.

use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use studycircle_rules::validate;
use studycircle_types::api::{SuggestionKind, SuggestionRequest, SuggestionResponse};

use crate::error::ServiceError;
use crate::state::AppState;

const SYSTEM_INSTRUCTION: &str = "You are a patient study assistant for school students. \
     Give clear, encouraging, age-appropriate guidance. When asked for structured output, \
     reply with JSON only.";

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 1000;

/// Upstream connection settings.
#[derive(Debug, Clone)]
pub struct SuggestionConfig {
    /// Without a key every request fails as an upstream error.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct SuggestionClient {
    config: SuggestionConfig,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl SuggestionClient {
    pub fn new(config: SuggestionConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http_client })
    }

    /// One completion round trip. No retries.
    pub async fn suggest(&self, req: &SuggestionRequest) -> Result<Value, ServiceError> {
        validate::body("content", &req.content)?;

        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::Upstream("suggestion service is not configured".into()))?;

        let prompt = build_prompt(req.kind, &req.content, req.subject.as_deref());
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_INSTRUCTION },
                { "role": "user", "content": prompt },
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        debug!("Requesting {:?} suggestion from {}", req.kind, url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Suggestion request failed: {}", e);
                ServiceError::Upstream(format!("suggestion request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("Suggestion upstream returned {}: {}", status, detail);
            return Err(ServiceError::Upstream(upstream_failure(status.as_u16(), &detail)));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("unreadable upstream reply: {}", e)))?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::Upstream("upstream reply had no content".into()))?;

        Ok(parse_suggestion(&text))
    }
}

/// Failure text for a non-2xx reply, carrying the API's own error message
/// when the body has the usual `{"error": {"message": ...}}` shape.
pub fn upstream_failure(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorReply>(body) {
        Ok(reply) if !reply.error.message.trim().is_empty() => {
            format!("upstream returned HTTP {}: {}", status, reply.error.message.trim())
        }
        _ => format!("upstream returned HTTP {}", status),
    }
}

pub fn build_prompt(kind: SuggestionKind, content: &str, subject: Option<&str>) -> String {
    let subject = subject.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("general studies");
    match kind {
        SuggestionKind::QuestionImprovement => format!(
            "A student wants to ask this {subject} question:\n\n{content}\n\n\
             Suggest how to make it clearer and easier to answer. Respond as JSON with the keys \
             \"improved_title\", \"improved_content\" and \"tips\" (an array of short strings)."
        ),
        SuggestionKind::AnswerHints => format!(
            "A student is answering this {subject} question:\n\n{content}\n\n\
             Give hints that guide them toward a good answer without solving it for them. \
             Respond as JSON with the keys \"hints\" (an array of strings) and \"key_concepts\" \
             (an array of strings)."
        ),
        SuggestionKind::StudyPlan => format!(
            "Create a one-week study plan in {subject} for a student with this goal:\n\n{content}\n\n\
             Respond as JSON with the keys \"overview\" and \"days\" (an array of objects with \
             \"day\", \"focus\" and \"activities\")."
        ),
    }
}

/// Structured replies pass through; anything else is wrapped as `{content}`.
pub fn parse_suggestion(text: &str) -> Value {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    match serde_json::from_str::<Value>(unfenced) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => json!({ "content": text }),
    }
}

pub async fn suggest(State(state): State<AppState>, Json(req): Json<SuggestionRequest>) -> impl IntoResponse {
    match state.suggestions.suggest(&req).await {
        Ok(suggestion) => (
            StatusCode::OK,
            Json(SuggestionResponse {
                success: true,
                suggestion: Some(suggestion),
                error: None,
            }),
        ),
        Err(e) => {
            (
                e.status(),
                Json(SuggestionResponse {
                    success: false,
                    suggestion: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_carry_content_and_subject() {
        let prompt = build_prompt(SuggestionKind::AnswerHints, "Why is the sky blue?", Some("Science"));
        assert!(prompt.contains("Why is the sky blue?"));
        assert!(prompt.contains("Science"));
        assert!(prompt.contains("hints"));

        let plan = build_prompt(SuggestionKind::StudyPlan, "Pass algebra", None);
        assert!(plan.contains("general studies"));
    }

    #[test]
    fn test_json_reply_is_passed_through() {
        let value = parse_suggestion(r#"{"hints": ["think about scattering"]}"#);
        assert_eq!(value["hints"][0], "think about scattering");
    }

    #[test]
    fn test_fenced_json_reply_is_unwrapped() {
        let value = parse_suggestion("```json\n{\"overview\": \"steady\"}\n```");
        assert_eq!(value["overview"], "steady");
    }

    #[test]
    fn test_plain_text_reply_is_wrapped() {
        let value = parse_suggestion("Try rereading chapter two.");
        assert_eq!(value, json!({ "content": "Try rereading chapter two." }));

        // Bare scalars are not structured suggestions.
        assert_eq!(parse_suggestion("42"), json!({ "content": "42" }));
    }

    #[test]
    fn test_upstream_error_message_is_kept() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(
            upstream_failure(401, body),
            "upstream returned HTTP 401: Incorrect API key provided"
        );
        assert_eq!(upstream_failure(503, "<html>busy</html>"), "upstream returned HTTP 503");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_upstream_failure() {
        let client = SuggestionClient::new(SuggestionConfig::default()).unwrap();
        let req = SuggestionRequest {
            kind: SuggestionKind::StudyPlan,
            content: "Learn fractions".into(),
            subject: None,
        };
        let err = client.suggest(&req).await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
    }
}
