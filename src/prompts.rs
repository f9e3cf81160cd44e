//! Prompt templates for each task kind.
//!
//! Every user prompt spells out the exact JSON shape expected back. Caller
//! text is embedded as a JSON string literal, so quotes, braces or fences in
//! the input can never close the instructed format early, and nothing is
//! truncated.

use serde_json::{Map, Value};

use crate::models::{AnalysisRequest, TaskKind};

/// Optional parameter keys with a dedicated slot in the clarity plan prompt
pub const CLARITY_BLOCKS_PARAM: &str = "blocks";
pub const CLARITY_SKILLS_PARAM: &str = "skills";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Output budget for this task, before the tier cap is applied
    pub max_tokens: u32,
}

/// Build the system and user messages for a request.
pub fn build_prompt(request: &AnalysisRequest) -> Prompt {
    let input = quote(&request.free_text_input);

    match request.task_kind {
        TaskKind::IdeaAnalysis => Prompt {
            system: IDEA_SYSTEM.to_string(),
            user: format!(
                "{IDEA_SHAPE}\n\nIdea to analyze: {input}{context}\n\n{JSON_ONLY}",
                context = context_block(request, &[]),
            ),
            max_tokens: 1500,
        },
        TaskKind::NicheValidation => Prompt {
            system: NICHE_SYSTEM.to_string(),
            user: format!(
                "{NICHE_SHAPE}\n\nNiche to validate: {input}{context}\n\n{JSON_ONLY}",
                context = context_block(request, &[]),
            ),
            max_tokens: 1500,
        },
        TaskKind::BusinessModel => Prompt {
            system: BUSINESS_MODEL_SYSTEM.to_string(),
            user: format!(
                "{BUSINESS_MODEL_SHAPE}\n\nBusiness idea: {input}{context}\n\n{JSON_ONLY}",
                context = context_block(request, &[]),
            ),
            max_tokens: 1500,
        },
        TaskKind::ClarityPlan => {
            let blocks = quote(request.parameter(CLARITY_BLOCKS_PARAM).unwrap_or(""));
            let skills = quote(request.parameter(CLARITY_SKILLS_PARAM).unwrap_or(""));
            Prompt {
                system: CLARITY_SYSTEM.to_string(),
                user: format!(
                    "Based on these details, create a comprehensive action plan.\n\n\
                     Goal: {input}\n\
                     Blocking factors: {blocks}\n\
                     Skills/Assets: {skills}{context}\n\n\
                     {CLARITY_SHAPE}\n\n{JSON_ONLY}",
                    context = context_block(request, &[CLARITY_BLOCKS_PARAM, CLARITY_SKILLS_PARAM]),
                ),
                max_tokens: 1200,
            }
        }
    }
}

/// Encode text as a JSON string literal.
fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// Optional parameters, minus `skip`, as a JSON object in key order.
fn context_block(request: &AnalysisRequest, skip: &[&str]) -> String {
    let params: Map<String, Value> = request
        .optional_parameters
        .iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    if params.is_empty() {
        String::new()
    } else {
        format!("\nAdditional context: {}", Value::Object(params))
    }
}

const JSON_ONLY: &str = "Respond with ONLY the JSON object: no markdown fences, no additional text.";

const IDEA_SYSTEM: &str = "You are an expert business analyst. Provide detailed, actionable business analysis in valid JSON format only.";

const IDEA_SHAPE: &str = r#"Analyze this business idea and respond in this exact JSON format:

{
  "rating": <integer from 1 to 10>,
  "swot": {
    "strengths": ["strength 1", "strength 2", "strength 3"],
    "weaknesses": ["weakness 1", "weakness 2"],
    "opportunities": ["opportunity 1", "opportunity 2", "opportunity 3"],
    "threats": ["threat 1", "threat 2"]
  },
  "niches": ["niche 1", "niche 2", "niche 3", "niche 4"],
  "products": ["product idea 1", "product idea 2", "product idea 3", "product idea 4", "product idea 5"],
  "monetization": ["monetization path 1", "monetization path 2", "monetization path 3", "monetization path 4"],
  "mvp": "A specific, actionable MVP recommendation in 1-2 sentences"
}

Every field is required. All list entries are strings."#;

const NICHE_SYSTEM: &str = "You are a market research expert. Provide detailed niche validation in valid JSON format only.";

const NICHE_SHAPE: &str = r#"Validate this target niche and respond in this exact JSON format:

{
  "viability_score": <integer from 1 to 10>,
  "market_size": "Estimated market size and growth in 1-2 sentences",
  "revenue_opportunity": "Realistic revenue potential in 1-2 sentences",
  "demographics": ["demographic 1", "demographic 2", "demographic 3"],
  "pricing_strategies": ["pricing strategy 1", "pricing strategy 2", "pricing strategy 3"],
  "entry_strategy": "A concrete market entry strategy in 2-3 sentences",
  "competitors": ["competitor 1", "competitor 2", "competitor 3"]
}

Every field is required. All list entries are strings."#;

const BUSINESS_MODEL_SYSTEM: &str = "You are a business strategist. Provide complete, practical business models in valid JSON format only.";

const BUSINESS_MODEL_SHAPE: &str = r#"Create a business model for this idea and respond in this exact JSON format:

{
  "value_proposition": "The core value proposition in 1-2 sentences",
  "target_customer": "The primary target customer in 1-2 sentences",
  "revenue_streams": ["revenue stream 1", "revenue stream 2", "revenue stream 3"],
  "cost_structure": ["cost 1", "cost 2", "cost 3"],
  "marketing_channels": ["channel 1", "channel 2", "channel 3"],
  "customer_acquisition": "The customer acquisition strategy in 2-3 sentences",
  "implementation_steps": ["step 1", "step 2", "step 3", "step 4", "step 5"],
  "key_metrics": ["metric 1", "metric 2", "metric 3"]
}

Every field is required. All list entries are strings."#;

const CLARITY_SYSTEM: &str = "You are a productivity coach. Provide detailed, actionable weekly plans in valid JSON format only.";

const CLARITY_SHAPE: &str = r#"Respond in this exact JSON format:

{
  "weekly_plan": [
    {"day": "Monday", "tasks": ["task 1", "task 2", "task 3"]},
    {"day": "Tuesday", "tasks": ["task 1", "task 2", "task 3"]},
    {"day": "Wednesday", "tasks": ["task 1", "task 2", "task 3"]},
    {"day": "Thursday", "tasks": ["task 1", "task 2", "task 3"]},
    {"day": "Friday", "tasks": ["task 1", "task 2", "task 3"]},
    {"day": "Saturday", "tasks": ["task 1", "task 2"]},
    {"day": "Sunday", "tasks": ["task 1", "task 2"]}
  ],
  "mindset_advice": "Specific mindset advice in 2-3 sentences",
  "productivity_tip": "A concrete productivity tip in 1-2 sentences",
  "pep_talk": "An encouraging pep talk in 2-3 sentences"
}

Every field is required. All list entries are strings."#;
