//! Settings Module
//!
//! Owns the persisted credential store: API keys per subscription tier, a
//! primary key used when a tier has none of its own, and the user's current
//! tier. Keys are encrypted at rest using AES-256-GCM.
//!
//! The gateway only sees the [`CredentialResolver`] trait and resolves a
//! fresh [`TierCredential`] for every call.

pub mod storage;
pub mod routes;

pub use storage::*;
pub use routes::router;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TierProfile;
use crate::types::GatewayResult;

/// Subscription tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Ultra,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Free => write!(f, "free"),
            Tier::Pro => write!(f, "pro"),
            Tier::Ultra => write!(f, "ultra"),
        }
    }
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::Ultra];

    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "free" => Some(Tier::Free),
            "pro" => Some(Tier::Pro),
            "ultra" => Some(Tier::Ultra),
            _ => None,
        }
    }
}

/// Everything the gateway needs to call upstream for one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCredential {
    pub tier: Tier,
    pub api_key: String,
    pub model_identifier: String,
    pub token_limit: u32,
}

#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Credential for `tier`, or `MissingCredential` if none was provisioned.
    async fn resolve_credential(&self, tier: Tier) -> GatewayResult<TierCredential>;

    async fn current_tier(&self) -> Tier;
}

/// Key and optional model override for one tier
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TierKeyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Persisted credential settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserSettings {
    #[serde(default)]
    pub current_tier: Tier,

    /// Used for any tier without a key of its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    #[serde(default)]
    pub free: TierKeyConfig,

    #[serde(default)]
    pub pro: TierKeyConfig,

    #[serde(default)]
    pub ultra: TierKeyConfig,
}

impl UserSettings {
    pub fn tier(&self, tier: Tier) -> &TierKeyConfig {
        match tier {
            Tier::Free => &self.free,
            Tier::Pro => &self.pro,
            Tier::Ultra => &self.ultra,
        }
    }

    pub fn tier_mut(&mut self, tier: Tier) -> &mut TierKeyConfig {
        match tier {
            Tier::Free => &mut self.free,
            Tier::Pro => &mut self.pro,
            Tier::Ultra => &mut self.ultra,
        }
    }

    /// Tier key if set, otherwise the primary key. Blank keys count as unset.
    pub fn key_for(&self, tier: Tier) -> Option<&str> {
        non_blank(self.tier(tier).api_key.as_deref()).or(non_blank(self.primary_key.as_deref()))
    }

    pub fn has_any_key(&self) -> bool {
        non_blank(self.primary_key.as_deref()).is_some()
            || Tier::ALL
                .iter()
                .any(|t| non_blank(self.tier(*t).api_key.as_deref()).is_some())
    }

    pub fn clear_keys(&mut self) {
        self.primary_key = None;
        for tier in Tier::ALL {
            self.tier_mut(tier).api_key = None;
        }
    }
}

fn non_blank(key: Option<&str>) -> Option<&str> {
    key.filter(|k| !k.trim().is_empty())
}

/// Settings response for the frontend (masks API keys)
#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    pub current_tier: Tier,
    pub primary: KeyStatus,
    pub free: KeyStatus,
    pub pro: KeyStatus,
    pub ultra: KeyStatus,
    pub has_any_key: bool,
}

/// Key status for frontend display (masks actual key)
#[derive(Debug, Clone, Serialize)]
pub struct KeyStatus {
    pub has_key: bool,
    /// Last 4 chars only
    pub key_hint: Option<String>,
    pub model: Option<String>,
}

impl KeyStatus {
    fn new(api_key: Option<&str>, model: Option<String>) -> Self {
        let (has_key, key_hint) = match non_blank(api_key) {
            Some(key) if key.chars().count() > 4 => {
                let tail: String = key.chars().skip(key.chars().count() - 4).collect();
                (true, Some(format!("••••{}", tail)))
            }
            Some(_) => (true, Some("••••".to_string())),
            None => (false, None),
        };

        Self {
            has_key,
            key_hint,
            model,
        }
    }
}

impl From<&UserSettings> for SettingsResponse {
    fn from(settings: &UserSettings) -> Self {
        let status = |cfg: &TierKeyConfig| KeyStatus::new(cfg.api_key.as_deref(), cfg.model.clone());
        Self {
            current_tier: settings.current_tier,
            primary: KeyStatus::new(settings.primary_key.as_deref(), None),
            free: status(&settings.free),
            pro: status(&settings.pro),
            ultra: status(&settings.ultra),
            has_any_key: settings.has_any_key(),
        }
    }
}

/// Public catalog entry for one tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierInfo {
    pub tier: Tier,
    pub name: String,
    pub model: String,
    pub token_limit: u32,
    pub price_usd: u32,
}

impl TierInfo {
    pub fn new(tier: Tier, profile: &TierProfile) -> Self {
        Self {
            tier,
            name: profile.name.clone(),
            model: profile.model.clone(),
            token_limit: profile.token_limit,
            price_usd: profile.price_usd,
        }
    }
}

/// Request to update settings. An empty string clears a key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub current_tier: Option<Tier>,
    pub primary_key: Option<String>,
    pub free_key: Option<String>,
    pub pro_key: Option<String>,
    pub ultra_key: Option<String>,
    pub free_model: Option<String>,
    pub pro_model: Option<String>,
    pub ultra_model: Option<String>,
}

impl UpdateSettingsRequest {
    pub fn apply(self, settings: &mut UserSettings) {
        if let Some(tier) = self.current_tier {
            settings.current_tier = tier;
        }
        if let Some(key) = self.primary_key {
            settings.primary_key = normalize(key);
        }

        let per_tier = [
            (Tier::Free, self.free_key, self.free_model),
            (Tier::Pro, self.pro_key, self.pro_model),
            (Tier::Ultra, self.ultra_key, self.ultra_model),
        ];
        for (tier, key, model) in per_tier {
            let cfg = settings.tier_mut(tier);
            if let Some(key) = key {
                cfg.api_key = normalize(key);
            }
            if let Some(model) = model {
                cfg.model = normalize(model);
            }
        }
    }
}

fn normalize(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
