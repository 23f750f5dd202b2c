use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use super::controller::{CancellationFlag, RefinementController, RefinementOutcome, RefinementSettings};
use super::domain::{Recommendation, RecommendationId};
use super::repository::{RecommendationStore, StoreError, StoredRecommendation};

/// Conversational recommendation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub conversation_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f64>,
}

impl RecommendationRequest {
    pub fn new(conversation_text: impl Into<String>) -> Self {
        Self {
            conversation_text: conversation_text.into(),
            user_id: None,
            max_iterations: None,
            score_threshold: None,
        }
    }
}

/// Optional traveler feedback for an extra reflection cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReflectRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Response envelope for recommendation endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationResponse {
    pub status: &'static str,
    pub recommendation_id: RecommendationId,
    pub processing_time_ms: Option<u64>,
    pub recommendation: Recommendation,
}

impl From<StoredRecommendation> for RecommendationResponse {
    fn from(record: StoredRecommendation) -> Self {
        let recommendation = record.recommendation;
        Self {
            status: recommendation.status.label(),
            recommendation_id: recommendation.recommendation_id.clone(),
            processing_time_ms: recommendation.processing_time_ms,
            recommendation,
        }
    }
}

/// Cancels the refinement task when the awaiting caller goes away.
struct CancelOnDrop(CancellationFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Service composing the refinement controller and the recommendation store.
pub struct RecommendationService<S> {
    controller: Arc<RefinementController>,
    store: Arc<S>,
    settings: RefinementSettings,
}

impl<S> RecommendationService<S>
where
    S: RecommendationStore + 'static,
{
    pub fn new(controller: Arc<RefinementController>, store: Arc<S>, settings: RefinementSettings) -> Self {
        Self {
            controller,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &RefinementSettings {
        &self.settings
    }

    /// Merges per-request overrides onto the configured settings.
    pub fn settings_for(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RefinementSettings, RecommendationServiceError> {
        if request.conversation_text.trim().is_empty() {
            return Err(RecommendationServiceError::InvalidRequest(
                "conversation_text must not be blank".to_string(),
            ));
        }

        let mut settings = self.settings;
        if let Some(max_iterations) = request.max_iterations {
            if max_iterations == 0 {
                return Err(RecommendationServiceError::InvalidRequest(
                    "max_iterations must be at least 1".to_string(),
                ));
            }
            settings.max_iterations = max_iterations;
        }
        if let Some(threshold) = request.score_threshold {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(RecommendationServiceError::InvalidRequest(format!(
                    "score_threshold must be within 0..=100, got {threshold}"
                )));
            }
            settings.score_threshold = threshold;
        }
        Ok(settings)
    }

    /// Runs the refinement loop for a request and stores the result.
    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<StoredRecommendation, RecommendationServiceError> {
        let settings = self.settings_for(&request)?;
        let cancel = CancellationFlag::new();
        let _guard = CancelOnDrop(cancel.clone());

        let controller = self.controller.clone();
        let text = request.conversation_text.clone();
        let user_id = request.user_id.clone();
        let record = isolated(&request.conversation_text, request.user_id.clone(), async move {
            controller.recommend(&text, user_id, &settings, &cancel).await
        })
        .await;

        info!(summary = ?record.summary(), "recommendation stored");
        Ok(self.store.insert(record)?)
    }

    /// Fetches a stored recommendation.
    pub fn get(
        &self,
        id: &RecommendationId,
    ) -> Result<StoredRecommendation, RecommendationServiceError> {
        self.store
            .fetch(id)?
            .ok_or_else(|| RecommendationServiceError::NotFound(id.to_string()))
    }

    /// Runs one more reflection cycle on a stored recommendation.
    ///
    /// Feedback is appended to the original query and the needs are re-extracted from the
    /// combined text before reflecting.
    pub async fn reflect(
        &self,
        id: &RecommendationId,
        request: ReflectRequest,
    ) -> Result<StoredRecommendation, RecommendationServiceError> {
        let stored = self.get(id)?;
        let original = stored.recommendation.clone();

        let feedback = request
            .feedback
            .as_deref()
            .map(str::trim)
            .filter(|feedback| !feedback.is_empty());
        let needs = match (feedback, stored.needs) {
            (Some(feedback), _) => {
                let text = format!("{}\n{}", original.query_text, feedback);
                self.controller.extract_needs(&text).await
            }
            (None, Some(needs)) => needs,
            (None, None) => self.controller.extract_needs(&original.query_text).await,
        };

        let controller = self.controller.clone();
        let settings = self.settings;
        let previous = original.clone();
        let mut record = isolated(&original.query_text, original.user_id.clone(), async move {
            controller.reflect_once(&previous, &needs, &settings).await
        })
        .await;

        record.recommendation.recommendation_id = original.recommendation_id.clone();
        record.recommendation.created_at = original.created_at;
        if let Some(feedback) = feedback {
            record
                .recommendation
                .note("traveler_feedback", Value::String(feedback.to_string()));
        }

        self.store.update(record.clone())?;
        Ok(record)
    }
}

/// Runs a refinement on its own task so a panic becomes a failed recommendation.
async fn isolated<F>(query: &str, user_id: Option<String>, work: F) -> StoredRecommendation
where
    F: Future<Output = RefinementOutcome> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(outcome) => StoredRecommendation {
            recommendation: outcome.recommendation,
            needs: Some(outcome.needs),
        },
        Err(join_error) => {
            error!(error = %join_error, "refinement task aborted");
            let mut recommendation = Recommendation::failed(
                query,
                user_id,
                format!("refinement aborted: {join_error}"),
            );
            recommendation.note("panicked", json!(join_error.is_panic()));
            StoredRecommendation {
                recommendation,
                needs: None,
            }
        }
    }
}

/// Error raised by the recommendation service.
#[derive(Debug, thiserror::Error)]
pub enum RecommendationServiceError {
    #[error("recommendation {0} not found")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
