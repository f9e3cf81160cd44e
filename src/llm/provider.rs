use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::settings::TierCredential;
use crate::types::{GatewayError, GatewayResult, LLMMessage, LLMRequest, LLMResponse};

/// One chat-completion call against an upstream provider.
///
/// Implementations classify failures themselves: HTTP 429 becomes
/// `RateLimited`, everything else `UpstreamFailure`.
#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(
        &self,
        api_key: &str,
        request: &LLMRequest,
    ) -> GatewayResult<LLMResponse>;
}

/// An upstream model to try, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidate {
    pub identifier: String,
    pub is_free: bool,
}

impl ModelCandidate {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let is_free = identifier.ends_with(":free");
        Self {
            identifier,
            is_free,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    pub raw_text: String,
    pub usage_tokens: Option<u32>,
    /// The candidate that answered
    pub model: String,
}

/// Runs a completion against an ordered candidate list, one model at a time.
pub struct CompletionClient {
    adapter: Arc<dyn LLMAdapter>,
    temperature: f32,
}

impl CompletionClient {
    pub fn new(adapter: Arc<dyn LLMAdapter>, temperature: f32) -> Self {
        Self {
            adapter,
            temperature,
        }
    }

    /// Complete with the credential's token limit as the output budget.
    pub async fn complete(
        &self,
        candidates: &[ModelCandidate],
        system_message: &str,
        user_message: &str,
        credential: &TierCredential,
    ) -> GatewayResult<CompletionResult> {
        self.complete_with_limit(candidates, system_message, user_message, credential, None)
            .await
    }

    /// Try each candidate in turn until one answers.
    ///
    /// A 429 ends the call immediately: the limit belongs to the credential,
    /// so another model under the same key would be refused as well. Any
    /// other failure moves on to the next candidate; if the last one fails
    /// too, its error is returned and earlier ones are only logged.
    pub async fn complete_with_limit(
        &self,
        candidates: &[ModelCandidate],
        system_message: &str,
        user_message: &str,
        credential: &TierCredential,
        max_tokens: Option<u32>,
    ) -> GatewayResult<CompletionResult> {
        if credential.api_key.trim().is_empty() {
            warn!(tier = %credential.tier, "Completion requested without an API key");
            return Err(GatewayError::MissingCredential);
        }
        if candidates.is_empty() {
            warn!(tier = %credential.tier, "Completion requested with no candidate models");
            return Err(GatewayError::MissingCredential);
        }

        let max_tokens = max_tokens
            .map(|m| m.min(credential.token_limit))
            .unwrap_or(credential.token_limit);
        let messages = vec![
            LLMMessage::system(system_message),
            LLMMessage::user(user_message),
        ];

        let total = candidates.len();
        let mut last_error = GatewayError::MissingCredential;

        for (index, candidate) in candidates.iter().enumerate() {
            let request = LLMRequest {
                model: candidate.identifier.clone(),
                messages: messages.clone(),
                max_tokens: Some(max_tokens),
                temperature: Some(self.temperature),
            };

            info!(
                model = %candidate.identifier,
                attempt = index + 1,
                total,
                is_free = candidate.is_free,
                "Requesting completion"
            );

            match self
                .adapter
                .create_chat_completion(&credential.api_key, &request)
                .await
            {
                Ok(response) => {
                    info!(
                        model = %candidate.identifier,
                        response_len = response.content.len(),
                        "Completion succeeded"
                    );
                    return Ok(CompletionResult {
                        raw_text: response.content,
                        usage_tokens: response.usage.map(|u| u.total_tokens),
                        model: candidate.identifier.clone(),
                    });
                }
                Err(GatewayError::RateLimited) => {
                    warn!(model = %candidate.identifier, tier = %credential.tier, "Rate limited, not trying other models");
                    return Err(GatewayError::RateLimited);
                }
                Err(e) => {
                    if index + 1 < total {
                        warn!(model = %candidate.identifier, error = %e, "Model failed, trying next candidate");
                    } else {
                        error!(model = %candidate.identifier, error = %e, "Last candidate model failed");
                    }
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::settings::Tier;
    use crate::types::TokenUsage;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Adapter that replays scripted outcomes and records what it was asked.
    #[derive(Default)]
    pub(crate) struct ScriptedAdapter {
        outcomes: Mutex<VecDeque<GatewayResult<LLMResponse>>>,
        pub requests: Mutex<Vec<LLMRequest>>,
    }

    impl ScriptedAdapter {
        pub(crate) fn new(outcomes: Vec<GatewayResult<LLMResponse>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn models_called(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.model.clone())
                .collect()
        }
    }

    #[async_trait]
    impl LLMAdapter for ScriptedAdapter {
        async fn create_chat_completion(
            &self,
            _api_key: &str,
            request: &LLMRequest,
        ) -> GatewayResult<LLMResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::upstream(None, "script exhausted")))
        }
    }

    pub(crate) fn reply(content: &str) -> GatewayResult<LLMResponse> {
        Ok(LLMResponse {
            content: content.to_string(),
            finish_reason: Some("stop".to_string()),
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            }),
        })
    }

    fn credential(api_key: &str) -> TierCredential {
        TierCredential {
            tier: Tier::Free,
            api_key: api_key.to_string(),
            model_identifier: "a:free".to_string(),
            token_limit: 5000,
        }
    }

    fn candidates(ids: &[&str]) -> Vec<ModelCandidate> {
        ids.iter().map(|id| ModelCandidate::new(*id)).collect()
    }

    #[test]
    fn test_candidate_free_flag() {
        assert!(ModelCandidate::new("meta-llama/llama-3.2-3b-instruct:free").is_free);
        assert!(!ModelCandidate::new("openai/o3-mini").is_free);
    }

    #[tokio::test]
    async fn test_empty_key_makes_no_call() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![reply("{}")]));
        let client = CompletionClient::new(adapter.clone(), 0.7);

        let result = client
            .complete(&candidates(&["a:free"]), "sys", "user", &credential("  "))
            .await;

        assert_eq!(result, Err(GatewayError::MissingCredential));
        assert!(adapter.models_called().is_empty());
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![]));
        let client = CompletionClient::new(adapter.clone(), 0.7);

        let result = client.complete(&[], "sys", "user", &credential("sk-test")).await;

        assert_eq!(result, Err(GatewayError::MissingCredential));
        assert!(adapter.models_called().is_empty());
    }

    #[tokio::test]
    async fn test_falls_through_server_errors() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![
            Err(GatewayError::upstream(Some(503), "unavailable")),
            Err(GatewayError::upstream(Some(503), "unavailable")),
            reply("{\"ok\": true}"),
        ]));
        let client = CompletionClient::new(adapter.clone(), 0.7);

        let result = client
            .complete(&candidates(&["a", "b", "c"]), "sys", "user", &credential("sk-test"))
            .await
            .unwrap();

        assert_eq!(result.raw_text, "{\"ok\": true}");
        assert_eq!(result.model, "c");
        assert_eq!(result.usage_tokens, Some(30));
        assert_eq!(adapter.models_called(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_last_error_wins() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![
            Err(GatewayError::upstream(Some(500), "first")),
            Err(GatewayError::upstream(None, "second")),
        ]));
        let client = CompletionClient::new(adapter, 0.7);

        let result = client
            .complete(&candidates(&["a", "b"]), "sys", "user", &credential("sk-test"))
            .await;

        assert_eq!(result, Err(GatewayError::upstream(None, "second")));
    }

    #[tokio::test]
    async fn test_rate_limit_stops_fallback() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![
            Err(GatewayError::RateLimited),
            reply("{}"),
        ]));
        let client = CompletionClient::new(adapter.clone(), 0.7);

        let result = client
            .complete(&candidates(&["a", "b"]), "sys", "user", &credential("sk-test"))
            .await;

        assert_eq!(result, Err(GatewayError::RateLimited));
        assert_eq!(adapter.models_called(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_request_shape() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![reply("{}")]));
        let client = CompletionClient::new(adapter.clone(), 0.7);

        client
            .complete_with_limit(
                &candidates(&["a:free"]),
                "be terse",
                "analyze this",
                &credential("sk-test"),
                Some(9000),
            )
            .await
            .unwrap();

        let requests = adapter.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.messages[0], LLMMessage::system("be terse"));
        assert_eq!(request.messages[1], LLMMessage::user("analyze this"));
        assert_eq!(request.temperature, Some(0.7));
        // Capped by the tier budget
        assert_eq!(request.max_tokens, Some(5000));
    }
}
