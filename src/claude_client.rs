use crate::models::chat::{ChatRole, ChatTurn};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Per-request timeout. Kept under the chat panel's own 30s deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion request timed out")]
    Timeout,
    #[error("completion service is rate limiting requests")]
    RateLimited { retry_after: Option<u64> },
    #[error("completion service error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("completion transport error: {0}")]
    Transport(String),
    #[error("failed to parse completion response: {0}")]
    InvalidResponse(String),
    #[error("completion contained no text")]
    Empty,
    #[error("no completion service configured")]
    NotConfigured,
}

/// Conversational completion service used by the intent resolver
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the raw text of the assistant's reply
    async fn complete(&self, system: &str, messages: &[ChatTurn]) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
pub struct ClaudeRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub messages: Vec<ClaudeMessage>,
    pub system: &'a str,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ClaudeResponse {
    pub content: Vec<ResponseContent>,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ClaudeClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.anthropic.com/v1".to_string(),
            model,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Converts chat turns into the alternating user/assistant sequence the
    /// messages API requires: leading assistant turns are dropped and
    /// consecutive turns from the same role are merged.
    pub fn to_messages(turns: &[ChatTurn]) -> Vec<ClaudeMessage> {
        let mut messages: Vec<ClaudeMessage> = Vec::with_capacity(turns.len());

        for turn in turns
            .iter()
            .filter(|t| !t.content.trim().is_empty())
            .skip_while(|t| t.role == ChatRole::Assistant)
        {
            match messages.last_mut() {
                Some(last) if last.role == turn.role.as_str() => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&turn.content);
                }
                _ => messages.push(ClaudeMessage {
                    role: turn.role.as_str().to_string(),
                    content: turn.content.clone(),
                }),
            }
        }

        messages
    }

    async fn send(&self, request: &ClaudeRequest<'_>) -> Result<ClaudeResponse, LlmError> {
        // Short retry window: the user is waiting on the other end
        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(4),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };

        // Connection errors and 500/502/503 are retried; 429 goes back to the caller
        let operation = || async {
            let response = self
                .client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .timeout(REQUEST_TIMEOUT)
                .json(request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        tracing::warn!("Claude API request timed out");
                        backoff::Error::permanent(LlmError::Timeout)
                    } else if e.is_connect() {
                        tracing::warn!("Claude API connection error (retrying): {}", e);
                        backoff::Error::transient(LlmError::Transport(e.to_string()))
                    } else {
                        tracing::error!("Claude API permanent error: {}", e);
                        backoff::Error::permanent(LlmError::Transport(e.to_string()))
                    }
                })?;

            let status = response.status();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());

            let response_text = response.text().await.map_err(|e| {
                if e.is_timeout() {
                    backoff::Error::permanent(LlmError::Timeout)
                } else {
                    backoff::Error::permanent(LlmError::Transport(e.to_string()))
                }
            })?;

            tracing::debug!("Claude API Response (status {}): {}", status, response_text);

            if status == StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!("Claude API rate limited (retry after {:?}s)", retry_after);
                return Err(backoff::Error::permanent(LlmError::RateLimited { retry_after }));
            }

            if matches!(status.as_u16(), 500 | 502 | 503) {
                tracing::warn!("Claude API returned {} (retrying): {}", status, response_text);
                return Err(backoff::Error::transient(LlmError::Api {
                    status: status.as_u16(),
                    body: response_text,
                }));
            }

            if !status.is_success() {
                tracing::error!("Claude API permanent error ({}): {}", status, response_text);
                return Err(backoff::Error::permanent(LlmError::Api {
                    status: status.as_u16(),
                    body: response_text,
                }));
            }

            serde_json::from_str::<ClaudeResponse>(&response_text)
                .map_err(|e| backoff::Error::permanent(LlmError::InvalidResponse(e.to_string())))
        };

        retry(backoff_config, operation).await
    }
}

#[async_trait]
impl CompletionClient for ClaudeClient {
    async fn complete(&self, system: &str, messages: &[ChatTurn]) -> Result<String, LlmError> {
        let request = ClaudeRequest {
            model: &self.model,
            max_tokens: 1024,
            messages: Self::to_messages(messages),
            system,
            temperature: 0.2,
        };

        tracing::debug!("Claude API Request messages count: {}", request.messages.len());

        let response = self.send(&request).await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = ?response.stop_reason,
                "Claude completion finished"
            );
        }

        let text: String = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContent::Text { text } => Some(text),
                ResponseContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            Err(LlmError::Empty)
        } else {
            Ok(text)
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: ChatRole, content: &str) -> ChatTurn {
        ChatTurn {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_to_messages_alternates_roles() {
        let turns = vec![
            turn(ChatRole::Assistant, "Welcome! Ask me about halal food."),
            turn(ChatRole::User, "ramen"),
            turn(ChatRole::User, "in Shinjuku"),
            turn(ChatRole::Assistant, "Here you go."),
            turn(ChatRole::User, "   "),
            turn(ChatRole::User, "cheaper?"),
        ];

        let messages = ClaudeClient::to_messages(&turns);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "ramen\n\nin Shinjuku");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].content, "cheaper?");
    }

    #[test]
    fn test_to_messages_starts_with_user_after_blank_turns() {
        let turns = vec![
            turn(ChatRole::User, "  "),
            turn(ChatRole::Assistant, "Welcome!"),
            turn(ChatRole::User, "ramen"),
        ];

        let messages = ClaudeClient::to_messages(&turns);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "ramen");
    }

    #[test]
    fn test_response_content_ignores_unknown_blocks() {
        let response: ClaudeResponse = serde_json::from_str(
            r#"{"content":[{"type":"thinking","thinking":"..."},{"type":"text","text":"{}"}],
                "stop_reason":"end_turn","usage":{"input_tokens":10,"output_tokens":2}}"#,
        )
        .unwrap();
        assert_eq!(response.content.len(), 2);
        assert!(matches!(response.content[1], ResponseContent::Text { .. }));
    }
}
