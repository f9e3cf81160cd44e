use axum::{extract::State, routing::get, Json, Router};

use crate::models::{AppState, HealthResponse};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (store, healthy) = state.ideas.status().await;

    Json(HealthResponse {
        status: (if healthy { "ok" } else { "degraded" }).to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        ideas_store: store.to_string(),
    })
}
