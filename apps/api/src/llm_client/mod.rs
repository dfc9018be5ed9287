//! Model invocation boundary.
//!
//! Outreach components only see `CompletionModel`. `LlmClient` is the production
//! implementation over the Anthropic Messages API, and it is the only code that
//! retries: 429, 5xx and connection failures back off exponentially from 1s.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
/// Fixed so prompt contracts are always evaluated by the same model.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_OUTPUT_TOKENS: u32 = 4096;
const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Single-shot text completion. `system` carries the fixed prompt contract,
/// `prompt` the per-call payload. Implementations never see pipeline state.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'static str,
    max_tokens: u32,
    system: &'a str,
    messages: [Turn<'a>; 1],
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    /// First non-blank text block.
    fn into_text(self) -> Option<String> {
        self.content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .find(|text| !text.trim().is_empty())
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of one HTTP attempt that did not produce a response body.
enum AttemptError {
    /// Worth another attempt after backing off.
    Transient(LlmError),
    /// Retrying would give the same answer.
    Permanent(LlmError),
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, api_key })
    }

    async fn attempt(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse, AttemptError> {
        let response = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(LlmError::Http(e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Transient(LlmError::Http(e)))?;

        if !status.is_success() {
            let err = LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            };
            return Err(if is_retryable(status) {
                AttemptError::Transient(err)
            } else {
                AttemptError::Permanent(err)
            });
        }

        serde_json::from_str(&body).map_err(|e| AttemptError::Permanent(LlmError::Parse(e)))
    }
}

#[async_trait]
impl CompletionModel for LlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_OUTPUT_TOKENS,
            system,
            messages: [Turn {
                role: "user",
                content: prompt,
            }],
        };

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = backoff(attempt);
                warn!("Retrying model call in {}ms (attempt {})", delay.as_millis(), attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&request).await {
                Ok(response) => {
                    if let Some(usage) = &response.usage {
                        debug!(
                            "Model call succeeded: input_tokens={}, output_tokens={}",
                            usage.input_tokens, usage.output_tokens
                        );
                    }
                    return response.into_text().ok_or(LlmError::EmptyContent);
                }
                Err(AttemptError::Permanent(err)) => return Err(err),
                Err(AttemptError::Transient(err)) => {
                    warn!("Model call attempt {} failed: {err}", attempt + 1);
                    last_error = Some(err);
                }
            }
        }

        Err(match last_error {
            Some(LlmError::Api { status: 429, .. }) | None => LlmError::RateLimited {
                retries: MAX_ATTEMPTS - 1,
            },
            Some(err) => err,
        })
    }
}

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, ...
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.saturating_sub(1).min(6))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// The API's `error.message` if the body is an error envelope, else the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Removes a Markdown code fence (with or without a language tag) wrapping
/// model output. Unfenced text is only trimmed.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_with_json_tag() {
        let input = "```json\n[{\"role\": \"Backend Engineer\"}]\n```";
        assert_eq!(strip_json_fences(input), "[{\"role\": \"Backend Engineer\"}]");
    }

    #[test]
    fn test_strip_fences_without_tag() {
        assert_eq!(strip_json_fences("```\n[]\n```"), "[]");
    }

    #[test]
    fn test_strip_fences_leaves_plain_text() {
        assert_eq!(strip_json_fences("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn test_strip_fences_tolerates_missing_closing_fence() {
        assert_eq!(strip_json_fences("```json\n[]"), "[]");
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(2), Duration::from_secs(2));
        assert_eq!(backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_api_error_message_prefers_envelope() {
        let body = r#"{"type": "error", "error": {"type": "invalid_request_error", "message": "max_tokens too large"}}"#;
        assert_eq!(api_error_message(body), "max_tokens too large");
        assert_eq!(api_error_message(" upstream timeout \n"), "upstream timeout");
    }

    #[test]
    fn test_response_text_skips_non_text_blocks() {
        let json = r#"{
            "content": [
                {"type": "tool_use", "id": "t1"},
                {"type": "text", "text": "Hello there"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_text().as_deref(), Some("Hello there"));
    }

    #[test]
    fn test_blank_response_has_no_text() {
        let json = r#"{"content": [{"type": "text", "text": "  "}]}"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert!(response.into_text().is_none());
    }
}
