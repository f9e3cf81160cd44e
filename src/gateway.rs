//! LLM Gateway
//!
//! Runs one user action end to end:
//!
//! ```text
//! AnalysisRequest
//!      │
//!      ▼
//! resolve credential (current tier, every call)
//!      │
//!      ▼
//! build prompt ──► complete over candidate models ──► extract + validate
//!                                                          │
//!                                                          ▼
//!                                                  StructuredResult
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::LLMConfig;
use crate::extract::parse_structured;
use crate::llm::{CompletionClient, LLMAdapter, ModelCandidate};
use crate::models::AnalysisRequest;
use crate::prompts::build_prompt;
use crate::results::StructuredResult;
use crate::settings::{CredentialResolver, Tier, TierCredential};
use crate::types::GatewayResult;

pub struct Gateway {
    resolver: Arc<dyn CredentialResolver>,
    client: CompletionClient,
    free_fallback_models: Vec<String>,
}

impl Gateway {
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        adapter: Arc<dyn LLMAdapter>,
        config: &LLMConfig,
    ) -> Self {
        Self {
            resolver,
            client: CompletionClient::new(adapter, config.temperature),
            free_fallback_models: config.free_fallback_models.clone(),
        }
    }

    /// Analyze with the user's current tier.
    pub async fn analyze(&self, request: &AnalysisRequest) -> GatewayResult<StructuredResult> {
        let tier = self.resolver.current_tier().await;
        self.analyze_with_tier(tier, request).await
    }

    pub async fn analyze_with_tier(
        &self,
        tier: Tier,
        request: &AnalysisRequest,
    ) -> GatewayResult<StructuredResult> {
        let credential = self.resolver.resolve_credential(tier).await?;
        let candidates = candidate_models(&credential, &self.free_fallback_models);
        let prompt = build_prompt(request);

        info!(
            task = %request.task_kind,
            %tier,
            input_len = request.free_text_input.len(),
            candidates = candidates.len(),
            "Starting gateway call"
        );

        let completion = self
            .client
            .complete_with_limit(
                &candidates,
                &prompt.system,
                &prompt.user,
                &credential,
                Some(prompt.max_tokens),
            )
            .await?;

        let result = parse_structured(request.task_kind, &completion.raw_text);
        match &result {
            Ok(_) => info!(
                task = %request.task_kind,
                model = %completion.model,
                usage_tokens = ?completion.usage_tokens,
                "Gateway call complete"
            ),
            Err(e) => warn!(task = %request.task_kind, model = %completion.model, error = %e, "Gateway call failed"),
        }
        result
    }
}

/// The tier's own model first; free-tier calls then fall back through the
/// configured free models. Duplicates are dropped, order is kept.
pub fn candidate_models(credential: &TierCredential, free_fallbacks: &[String]) -> Vec<ModelCandidate> {
    let mut candidates = Vec::new();
    let primary = credential.model_identifier.trim();
    if !primary.is_empty() {
        candidates.push(ModelCandidate::new(primary));
    }

    if credential.tier == Tier::Free {
        for model in free_fallbacks {
            if !candidates.iter().any(|c| c.identifier == *model) {
                candidates.push(ModelCandidate::new(model.clone()));
            }
        }
    }
    candidates
}
