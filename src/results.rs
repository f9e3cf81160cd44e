//! Structured Results
//!
//! One fixed-shape record per task kind. These are the only types a model
//! reply is ever parsed into; every field is required and ratings are
//! range-checked, so a value of one of these types is always complete.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::TaskKind;

/// A task-specific result shape that a model reply can be extracted into.
pub trait TaskOutput: DeserializeOwned + Serialize + Validate + Sized {
    const KIND: TaskKind;

    fn into_structured(self) -> StructuredResult;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct IdeaAnalysis {
    #[validate(range(min = 1, max = 10))]
    pub rating: u8,
    pub swot: Swot,
    pub niches: Vec<String>,
    pub products: Vec<String>,
    pub monetization: Vec<String>,
    pub mvp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swot {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NicheValidation {
    #[validate(range(min = 1, max = 10))]
    pub viability_score: u8,
    pub market_size: String,
    pub revenue_opportunity: String,
    pub demographics: Vec<String>,
    pub pricing_strategies: Vec<String>,
    pub entry_strategy: String,
    pub competitors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BusinessModel {
    pub value_proposition: String,
    pub target_customer: String,
    pub revenue_streams: Vec<String>,
    pub cost_structure: Vec<String>,
    pub marketing_channels: Vec<String>,
    pub customer_acquisition: String,
    pub implementation_steps: Vec<String>,
    pub key_metrics: Vec<String>,
}

/// Weekly action plan. Older prompts asked for camelCase keys, so those
/// spellings are still accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ClarityPlan {
    #[serde(alias = "weeklyPlan")]
    pub weekly_plan: Vec<DayPlan>,
    #[serde(alias = "mindsetAdvice")]
    pub mindset_advice: String,
    #[serde(alias = "productivityTip")]
    pub productivity_tip: String,
    #[serde(alias = "pepTalk")]
    pub pep_talk: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: String,
    pub tasks: Vec<String>,
}

impl TaskOutput for IdeaAnalysis {
    const KIND: TaskKind = TaskKind::IdeaAnalysis;

    fn into_structured(self) -> StructuredResult {
        StructuredResult::IdeaAnalysis(self)
    }
}

impl TaskOutput for NicheValidation {
    const KIND: TaskKind = TaskKind::NicheValidation;

    fn into_structured(self) -> StructuredResult {
        StructuredResult::NicheValidation(self)
    }
}

impl TaskOutput for BusinessModel {
    const KIND: TaskKind = TaskKind::BusinessModel;

    fn into_structured(self) -> StructuredResult {
        StructuredResult::BusinessModel(self)
    }
}

impl TaskOutput for ClarityPlan {
    const KIND: TaskKind = TaskKind::ClarityPlan;

    fn into_structured(self) -> StructuredResult {
        StructuredResult::ClarityPlan(self)
    }
}

/// The validated outcome of a gateway call, tagged with its task kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_kind", content = "result", rename_all = "snake_case")]
pub enum StructuredResult {
    IdeaAnalysis(IdeaAnalysis),
    NicheValidation(NicheValidation),
    BusinessModel(BusinessModel),
    ClarityPlan(ClarityPlan),
}

impl StructuredResult {
    pub fn kind(&self) -> TaskKind {
        match self {
            StructuredResult::IdeaAnalysis(_) => TaskKind::IdeaAnalysis,
            StructuredResult::NicheValidation(_) => TaskKind::NicheValidation,
            StructuredResult::BusinessModel(_) => TaskKind::BusinessModel,
            StructuredResult::ClarityPlan(_) => TaskKind::ClarityPlan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rating_out_of_range_fails_validation() {
        let analysis: IdeaAnalysis = serde_json::from_value(json!({
            "rating": 11,
            "swot": {"strengths": [], "weaknesses": [], "opportunities": [], "threats": []},
            "niches": [], "products": [], "monetization": [],
            "mvp": "Landing page"
        }))
        .unwrap();
        assert!(analysis.validate().is_err());
    }

    #[test]
    fn test_fractional_rating_is_rejected() {
        let parsed = serde_json::from_value::<IdeaAnalysis>(json!({
            "rating": 7.5,
            "swot": {"strengths": [], "weaknesses": [], "opportunities": [], "threats": []},
            "niches": [], "products": [], "monetization": [],
            "mvp": "Landing page"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_clarity_plan_accepts_camel_case() {
        let plan: ClarityPlan = serde_json::from_value(json!({
            "weeklyPlan": [{"day": "Monday", "tasks": ["Outline offer"]}],
            "mindsetAdvice": "Focus on progress.",
            "productivityTip": "Timebox mornings.",
            "pepTalk": "You can do this."
        }))
        .unwrap();
        assert_eq!(plan.weekly_plan[0].day, "Monday");

        // Serialization always uses the internal naming
        let value = serde_json::to_value(&plan).unwrap();
        assert!(value.get("weekly_plan").is_some());
        assert!(value.get("weeklyPlan").is_none());
    }

    #[test]
    fn test_structured_result_tagging() {
        let result = StructuredResult::BusinessModel(BusinessModel {
            value_proposition: "Faster invoicing".into(),
            target_customer: "Freelancers".into(),
            revenue_streams: vec!["Subscription".into()],
            cost_structure: vec![],
            marketing_channels: vec![],
            customer_acquisition: "Content marketing".into(),
            implementation_steps: vec![],
            key_metrics: vec![],
        });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["task_kind"], "business_model");
        assert_eq!(value["result"]["target_customer"], "Freelancers");
        assert_eq!(result.kind(), TaskKind::BusinessModel);
    }
}
