//! POST /api/analyze - run one analysis through the gateway

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;
use validator::Validate;

use crate::models::{AnalysisRequest, AppState};
use crate::results::StructuredResult;
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze))
        .with_state(state)
}

async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> AppResult<Json<StructuredResult>> {
    request
        .validate()
        .map_err(|_| AppError::InvalidRequest("free_text_input must not be empty".to_string()))?;

    info!(task = %request.task_kind, "Received analysis request");
    let result = state.gateway.analyze(&request).await?;
    Ok(Json(result))
}
