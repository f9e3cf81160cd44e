//! Settings API Routes
//!
//! - GET /api/settings - Current tier and masked key status
//! - POST /api/settings - Update keys, model overrides or the current tier
//! - GET /api/tiers - Tier catalog (name, model, token limit, price)
//! - GET /api/tiers/{tier} - One catalog entry

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{error, info};

use super::{SettingsResponse, Tier, TierInfo, UpdateSettingsRequest};
use crate::models::AppState;
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/settings", get(get_settings).post(update_settings))
        .route("/api/tiers", get(list_tiers))
        .route("/api/tiers/{tier}", get(get_tier))
        .with_state(state)
}

async fn get_settings(State(state): State<AppState>) -> AppResult<Json<SettingsResponse>> {
    let settings = state.settings.load().await.map_err(|e| {
        error!("Failed to load settings: {}", e);
        AppError::Internal("failed to load settings".to_string())
    })?;
    Ok(Json(SettingsResponse::from(&settings)))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> AppResult<Json<SettingsResponse>> {
    let settings = state
        .settings
        .update(|settings| request.apply(settings))
        .await
        .map_err(|e| {
            error!("Failed to update settings: {}", e);
            AppError::Internal("failed to save settings".to_string())
        })?;

    info!(
        tier = %settings.current_tier,
        has_any_key = settings.has_any_key(),
        "Settings updated"
    );
    Ok(Json(SettingsResponse::from(&settings)))
}

async fn list_tiers(State(state): State<AppState>) -> Json<Vec<TierInfo>> {
    let profiles = state.settings.profiles();
    Json(
        Tier::ALL
            .iter()
            .map(|tier| TierInfo::new(*tier, profiles.get(*tier)))
            .collect(),
    )
}

async fn get_tier(
    State(state): State<AppState>,
    Path(tier): Path<String>,
) -> AppResult<Json<TierInfo>> {
    let tier = Tier::from_id(&tier)
        .ok_or_else(|| AppError::NotFound(format!("unknown tier '{}'", tier)))?;
    Ok(Json(TierInfo::new(tier, state.settings.profiles().get(tier))))
}
