// OpenRouter adapter
// OpenAI-compatible chat completions: POST {base}/chat/completions
// API Reference: https://openrouter.ai/docs/api-reference/chat-completion

use crate::config::LLMConfig;
use crate::llm::provider::LLMAdapter;
use crate::types::{GatewayError, GatewayResult, LLMMessage, LLMRequest, LLMResponse, TokenUsage};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub struct OpenRouterAdapter {
    client: Client,
    base_url: String,
    referer: String,
    title: String,
    timeout: Duration,
}

// Request types for the OpenRouter API
#[derive(Serialize)]
struct OpenRouterChatRequest<'a> {
    model: &'a str,
    messages: &'a [LLMMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

// Response types for the OpenRouter API
#[derive(Deserialize)]
struct OpenRouterChatResponse {
    #[serde(default)]
    choices: Vec<OpenRouterChoice>,
    usage: Option<OpenRouterUsage>,
    // Some upstream providers report failures inside a 200 body
    error: Option<OpenRouterError>,
}

#[derive(Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenRouterResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenRouterUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct OpenRouterErrorResponse {
    error: OpenRouterError,
}

#[derive(Deserialize)]
struct OpenRouterError {
    message: String,
}

impl OpenRouterAdapter {
    pub fn new(config: &LLMConfig) -> reqwest::Result<Self> {
        let timeout = config.request_timeout();
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            referer: config.referer.clone(),
            title: config.title.clone(),
            timeout,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn classify_transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::upstream(
                None,
                format!("request timed out after {}s", self.timeout.as_secs()),
            )
        } else {
            GatewayError::upstream(None, format!("request failed: {}", e))
        }
    }

    fn classify_status(status: StatusCode, body: &str) -> GatewayError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return GatewayError::RateLimited;
        }

        let message = serde_json::from_str::<OpenRouterErrorResponse>(body)
            .map(|r| r.error.message)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                } else {
                    body.chars().take(500).collect()
                }
            });
        GatewayError::upstream(Some(status.as_u16()), message)
    }
}

#[async_trait]
impl LLMAdapter for OpenRouterAdapter {
    async fn create_chat_completion(
        &self,
        api_key: &str,
        request: &LLMRequest,
    ) -> GatewayResult<LLMResponse> {
        let body = OpenRouterChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        if !status.is_success() {
            debug!(%status, model = %request.model, "OpenRouter returned an error status");
            return Err(Self::classify_status(status, &text));
        }

        let parsed: OpenRouterChatResponse = serde_json::from_str(&text).map_err(|e| {
            GatewayError::upstream(
                Some(status.as_u16()),
                format!("malformed completion response: {}", e),
            )
        })?;

        if let Some(error) = parsed.error {
            return Err(GatewayError::upstream(Some(status.as_u16()), error.message));
        }

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            GatewayError::upstream(Some(status.as_u16()), "completion returned no choices")
        })?;

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::upstream(Some(status.as_u16()), "completion returned empty content")
            })?;

        Ok(LLMResponse {
            content,
            finish_reason: choice.finish_reason,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}
