use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::settings::Tier;

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: Option<DatabaseConfig>,
    pub llm: LLMConfig,
    pub tiers: TierProfiles,
    pub settings_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub temperature: f32,
    /// Tried in order after the tier's own model, free tier only
    pub free_fallback_models: Vec<String>,
    pub referer: String,
    pub title: String,
}

impl LLMConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            request_timeout_secs: 30,
            temperature: 0.7,
            free_fallback_models: default_free_models(),
            referer: "http://localhost:5173".to_string(),
            title: "IdeaForgeAI - Idea Validation Platform".to_string(),
        }
    }
}

/// Model, token budget and catalog entry for one subscription tier. Keys
/// never live here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TierProfile {
    pub name: String,
    pub model: String,
    pub token_limit: u32,
    /// Monthly price in whole US dollars
    pub price_usd: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TierProfiles {
    pub free: TierProfile,
    pub pro: TierProfile,
    pub ultra: TierProfile,
}

impl TierProfiles {
    pub fn get(&self, tier: Tier) -> &TierProfile {
        match tier {
            Tier::Free => &self.free,
            Tier::Pro => &self.pro,
            Tier::Ultra => &self.ultra,
        }
    }
}

impl Default for TierProfiles {
    fn default() -> Self {
        Self {
            free: TierProfile {
                name: "Free Tier".to_string(),
                model: "tngtech/deepseek-r1t2-chimera:free".to_string(),
                token_limit: 5000,
                price_usd: 0,
            },
            pro: TierProfile {
                name: "PRO Tier".to_string(),
                model: "openai/o3-mini".to_string(),
                token_limit: 20000,
                price_usd: 25,
            },
            ultra: TierProfile {
                name: "ULTRA Tier".to_string(),
                model: "openai/gpt-4o:extended".to_string(),
                token_limit: 50000,
                price_usd: 125,
            },
        }
    }
}

fn default_free_models() -> Vec<String> {
    [
        "meta-llama/llama-3.2-3b-instruct:free",
        "microsoft/phi-3-mini-128k-instruct:free",
        "huggingface/zephyr-7b-beta:free",
        "openchat/openchat-7b:free",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn tier_profile_from_env(prefix: &str, default: TierProfile) -> Result<TierProfile> {
    Ok(TierProfile {
        name: env::var(format!("{prefix}_NAME")).unwrap_or(default.name),
        model: env::var(format!("{prefix}_MODEL")).unwrap_or(default.model),
        token_limit: match env::var(format!("{prefix}_TOKEN_LIMIT")) {
            Ok(v) => v.parse()?,
            Err(_) => default.token_limit,
        },
        price_usd: match env::var(format!("{prefix}_PRICE_USD")) {
            Ok(v) => v.parse()?,
            Err(_) => default.price_usd,
        },
    })
}

/// A zero timeout would fail every upstream call immediately.
fn parse_timeout_secs(value: &str) -> Result<u64> {
    let secs: u64 = value.trim().parse()?;
    if secs == 0 {
        anyhow::bail!("LLM_REQUEST_TIMEOUT_SECS must be greater than 0");
    }
    Ok(secs)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let llm_defaults = LLMConfig::default();
        let tier_defaults = TierProfiles::default();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: split_list(
                    &env::var("ALLOWED_ORIGINS")
                        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string()),
                ),
            },
            database: match env::var("DATABASE_URL") {
                Ok(url) => Some(DatabaseConfig {
                    url,
                    max_connections: env::var("DB_MAX_CONNECTIONS")
                        .unwrap_or_else(|_| "10".to_string())
                        .parse()?,
                    min_connections: env::var("DB_MIN_CONNECTIONS")
                        .unwrap_or_else(|_| "1".to_string())
                        .parse()?,
                }),
                Err(_) => None,
            },
            llm: LLMConfig {
                base_url: env::var("OPENROUTER_BASE_URL").unwrap_or(llm_defaults.base_url),
                request_timeout_secs: parse_timeout_secs(
                    &env::var("LLM_REQUEST_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string()),
                )?,
                temperature: env::var("LLM_TEMPERATURE")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()?,
                free_fallback_models: env::var("LLM_FREE_FALLBACK_MODELS")
                    .map(|v| split_list(&v))
                    .unwrap_or(llm_defaults.free_fallback_models),
                referer: env::var("APP_REFERER").unwrap_or(llm_defaults.referer),
                title: env::var("APP_TITLE").unwrap_or(llm_defaults.title),
            },
            tiers: TierProfiles {
                free: tier_profile_from_env("TIER_FREE", tier_defaults.free)?,
                pro: tier_profile_from_env("TIER_PRO", tier_defaults.pro)?,
                ultra: tier_profile_from_env("TIER_ULTRA", tier_defaults.ultra)?,
            },
            settings_dir: env::var("SETTINGS_DIR").ok().map(PathBuf::from),
        })
    }
}
