//! Saved ideas
//!
//! - GET /api/users/{user_id}/ideas - newest first
//! - POST /api/users/{user_id}/ideas - save a finished idea analysis

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::{AppState, IdeaRecord, NewIdea, SaveIdeaRequest};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/users/{user_id}/ideas", get(list_ideas).post(save_idea))
        .with_state(state)
}

async fn list_ideas(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<IdeaRecord>>> {
    let ideas = state.ideas.list_for_user(user_id).await?;
    Ok(Json(ideas))
}

async fn save_idea(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<SaveIdeaRequest>,
) -> AppResult<(StatusCode, Json<IdeaRecord>)> {
    request
        .analysis
        .validate()
        .map_err(|e| AppError::InvalidRequest(format!("analysis is incomplete: {}", e)))?;

    let idea = NewIdea::from_analysis(request.title, request.description, &request.analysis);
    idea.validate()
        .map_err(|_| AppError::InvalidRequest("title must not be empty".to_string()))?;

    let record = state.ideas.save(user_id, idea).await?;
    info!(idea_id = %record.id, %user_id, "Idea saved");
    Ok((StatusCode::CREATED, Json(record)))
}
