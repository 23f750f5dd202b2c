use serde::{Deserialize, Serialize};

use super::domain::{Needs, Recommendation, RecommendationId};

/// Stored recommendation together with the needs it was finally built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecommendation {
    pub recommendation: Recommendation,
    /// Absent when the request failed before any needs were produced.
    pub needs: Option<Needs>,
}

impl StoredRecommendation {
    pub fn id(&self) -> &RecommendationId {
        &self.recommendation.recommendation_id
    }

    pub fn summary(&self) -> RecommendationSummary {
        let recommendation = &self.recommendation;
        RecommendationSummary {
            recommendation_id: recommendation.recommendation_id.clone(),
            status: recommendation.status.label(),
            overall_score: recommendation.scores.overall,
            option_count: recommendation.options.len(),
            reflection_iterations: recommendation.reflection_iterations,
            top_option: recommendation
                .top_option()
                .map(|option| option.ticket.id.clone()),
        }
    }
}

/// Storage abstraction so the service can be exercised in isolation.
pub trait RecommendationStore: Send + Sync {
    fn insert(&self, record: StoredRecommendation) -> Result<StoredRecommendation, StoreError>;
    fn update(&self, record: StoredRecommendation) -> Result<(), StoreError>;
    fn fetch(&self, id: &RecommendationId) -> Result<Option<StoredRecommendation>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("recommendation already exists")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Compact view used by logs and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationSummary {
    pub recommendation_id: RecommendationId,
    pub status: &'static str,
    pub overall_score: f64,
    pub option_count: usize,
    pub reflection_iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_option: Option<String>,
}
