// IdeaForge - LLM gateway for business-idea validation

pub mod config;
pub mod db;
pub mod extract;
pub mod gateway;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod prompts;
pub mod results;
pub mod routes;
pub mod settings;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use gateway::Gateway;
pub use models::{AnalysisRequest, AppState, TaskKind};
pub use results::StructuredResult;
pub use types::{GatewayError, GatewayResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
