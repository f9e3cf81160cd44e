use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::IdeasStore;
use crate::models::{IdeaRecord, NewIdea};
use crate::types::AppResult;

/// Process-local ideas store, used when no database is configured
#[derive(Default)]
pub struct MemoryIdeasStore {
    ideas: RwLock<Vec<IdeaRecord>>,
}

impl MemoryIdeasStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdeasStore for MemoryIdeasStore {
    async fn save(&self, user_id: Uuid, idea: NewIdea) -> AppResult<IdeaRecord> {
        let record = IdeaRecord {
            id: Uuid::new_v4(),
            user_id,
            title: idea.title,
            description: idea.description,
            rating: idea.rating,
            swot_analysis: idea.swot_analysis,
            niches: idea.niches,
            digital_products: idea.digital_products,
            monetization_paths: idea.monetization_paths,
            mvp_recommendation: idea.mvp_recommendation,
            created_at: chrono::Utc::now(),
        };
        self.ideas.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<IdeaRecord>> {
        let ideas = self.ideas.read().await;
        // Later inserts win ties on created_at
        let mut records: Vec<_> = ideas
            .iter()
            .enumerate()
            .filter(|(_, r)| r.user_id == user_id)
            .collect();
        records.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(records.into_iter().map(|(_, r)| r.clone()).collect())
    }

    async fn status(&self) -> (&'static str, bool) {
        ("memory", true)
    }
}
