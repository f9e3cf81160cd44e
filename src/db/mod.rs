//! Ideas store
//!
//! Saved ideas live in an external `ideas` table. The gateway never touches
//! it; route handlers save a record only once a validated analysis exists.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{IdeaRecord, NewIdea};
use crate::types::AppResult;

pub use memory::*;
pub use operations::*;
pub use pool::*;

pub mod memory;
pub mod operations;
pub mod pool;

#[async_trait]
pub trait IdeasStore: Send + Sync {
    async fn save(&self, user_id: Uuid, idea: NewIdea) -> AppResult<IdeaRecord>;

    /// Newest first
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<IdeaRecord>>;

    /// Backend label and whether it is reachable, for health checks
    async fn status(&self) -> (&'static str, bool);
}

pub async fn create_pool(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(&config.url)
        .await?;

    // Test connection
    health_check(&pool).await?;

    Ok(pool)
}
