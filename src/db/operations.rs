use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{health_check, IdeasStore};
use crate::models::{IdeaRecord, NewIdea};
use crate::types::AppResult;

/// Postgres-backed ideas store
#[derive(Clone)]
pub struct PgIdeasStore {
    pool: PgPool,
}

impl PgIdeasStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdeasStore for PgIdeasStore {
    async fn save(&self, user_id: Uuid, idea: NewIdea) -> AppResult<IdeaRecord> {
        let record = sqlx::query_as::<_, IdeaRecord>(
            r#"
            INSERT INTO ideas (
                id, user_id, title, description, rating, swot_analysis, niches,
                digital_products, monetization_paths, mvp_recommendation
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, user_id, title, description, rating, swot_analysis, niches,
                      digital_products, monetization_paths, mvp_recommendation, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&idea.title)
        .bind(&idea.description)
        .bind(idea.rating)
        .bind(&idea.swot_analysis)
        .bind(&idea.niches)
        .bind(&idea.digital_products)
        .bind(&idea.monetization_paths)
        .bind(&idea.mvp_recommendation)
        .fetch_one(&self.pool)
        .await?;

        info!(idea_id = %record.id, %user_id, "Saved idea");
        Ok(record)
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<IdeaRecord>> {
        let records = sqlx::query_as::<_, IdeaRecord>(
            r#"
            SELECT id, user_id, title, description, rating, swot_analysis, niches,
                   digital_products, monetization_paths, mvp_recommendation, created_at
            FROM ideas
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn status(&self) -> (&'static str, bool) {
        ("postgres", health_check(&self.pool).await.is_ok())
    }
}
