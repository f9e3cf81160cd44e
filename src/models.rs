use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::config::Config;
use crate::db::IdeasStore;
use crate::gateway::Gateway;
use crate::results::IdeaAnalysis;
use crate::settings::SettingsStorage;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<Gateway>,
    pub ideas: Arc<dyn IdeasStore>,
    pub settings: Arc<SettingsStorage>,
}

/// The kinds of analysis the gateway knows how to request and parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    IdeaAnalysis,
    NicheValidation,
    BusinessModel,
    ClarityPlan,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::IdeaAnalysis => write!(f, "idea_analysis"),
            TaskKind::NicheValidation => write!(f, "niche_validation"),
            TaskKind::BusinessModel => write!(f, "business_model"),
            TaskKind::ClarityPlan => write!(f, "clarity_plan"),
        }
    }
}

/// One user action's worth of input. Built once at submit time and passed
/// into the gateway by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AnalysisRequest {
    pub task_kind: TaskKind,
    #[validate(custom(function = "validate_not_blank"))]
    pub free_text_input: String,
    /// Extra labelled context, e.g. `budget`, `timeline`, or the `blocks`
    /// and `skills` fields of a clarity plan.
    #[serde(default)]
    pub optional_parameters: BTreeMap<String, String>,
}

impl AnalysisRequest {
    pub fn new(task_kind: TaskKind, free_text_input: impl Into<String>) -> Self {
        Self {
            task_kind,
            free_text_input: free_text_input.into(),
            optional_parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.optional_parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.optional_parameters.get(key).map(String::as_str)
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

// Ideas store records, mirroring the external `ideas` table

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdeaRecord {
    pub id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub title: String,
    pub description: String,
    pub rating: Option<i32>,
    pub swot_analysis: Option<serde_json::Value>,
    pub niches: Option<serde_json::Value>,
    pub digital_products: Option<serde_json::Value>,
    pub monetization_paths: Option<serde_json::Value>,
    pub mvp_recommendation: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewIdea {
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,
    pub description: String,
    pub rating: Option<i32>,
    pub swot_analysis: Option<serde_json::Value>,
    pub niches: Option<serde_json::Value>,
    pub digital_products: Option<serde_json::Value>,
    pub monetization_paths: Option<serde_json::Value>,
    pub mvp_recommendation: Option<String>,
}

impl NewIdea {
    /// Build a record from a finished analysis. Only a validated
    /// `IdeaAnalysis` can be turned into a saved idea.
    pub fn from_analysis(
        title: impl Into<String>,
        description: impl Into<String>,
        analysis: &IdeaAnalysis,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            rating: Some(i32::from(analysis.rating)),
            swot_analysis: serde_json::to_value(&analysis.swot).ok(),
            niches: serde_json::to_value(&analysis.niches).ok(),
            digital_products: serde_json::to_value(&analysis.products).ok(),
            monetization_paths: serde_json::to_value(&analysis.monetization).ok(),
            mvp_recommendation: Some(analysis.mvp.clone()),
        }
    }
}

/// Body of `POST /api/users/{user_id}/ideas`
#[derive(Debug, Deserialize)]
pub struct SaveIdeaRequest {
    pub title: String,
    pub description: String,
    pub analysis: IdeaAnalysis,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub ideas_store: String,
}
