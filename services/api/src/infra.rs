use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use ticket_reflect::config::AppConfig;
use ticket_reflect::workflows::recommendation::{
    HeuristicReflector, KeywordNeedsExtractor, LlmAdvisor, MockCandidateSupplier,
    QualityEvaluator, RecommendationId, RecommendationService, RecommendationStore,
    RefinementController, StoreError, StoredRecommendation,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRecommendationStore {
    records: Arc<Mutex<HashMap<RecommendationId, StoredRecommendation>>>,
}

impl InMemoryRecommendationStore {
    fn records(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<RecommendationId, StoredRecommendation>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("recommendation store lock poisoned".to_string()))
    }
}

impl RecommendationStore for InMemoryRecommendationStore {
    fn insert(&self, record: StoredRecommendation) -> Result<StoredRecommendation, StoreError> {
        let mut guard = self.records()?;
        if guard.contains_key(record.id()) {
            return Err(StoreError::Conflict);
        }
        guard.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: StoredRecommendation) -> Result<(), StoreError> {
        let mut guard = self.records()?;
        guard.insert(record.id().clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &RecommendationId) -> Result<Option<StoredRecommendation>, StoreError> {
        Ok(self.records()?.get(id).cloned())
    }
}

/// Wires the controller from configuration: the model-backed advisor when an endpoint is
/// configured, the offline keyword extractor and heuristic reflector otherwise.
pub(crate) fn build_controller(config: &AppConfig) -> RefinementController {
    let supplier = Arc::new(MockCandidateSupplier::default());

    match &config.llm {
        Some(llm) => {
            info!(base_url = %llm.base_url, model = %llm.model, "using model-backed advisor");
            let advisor = Arc::new(LlmAdvisor::from_config(llm));
            RefinementController::new(
                advisor.clone(),
                supplier,
                advisor.clone(),
                QualityEvaluator::with_judge(advisor),
            )
        }
        None => RefinementController::new(
            Arc::new(KeywordNeedsExtractor::new()),
            supplier,
            Arc::new(HeuristicReflector::new()),
            QualityEvaluator::rule_based(),
        ),
    }
}

pub(crate) fn build_service(
    config: &AppConfig,
    store: Arc<InMemoryRecommendationStore>,
) -> Arc<RecommendationService<InMemoryRecommendationStore>> {
    Arc::new(RecommendationService::new(
        Arc::new(build_controller(config)),
        store,
        config.refinement,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticket_reflect::workflows::recommendation::{Recommendation, RecommendationStatus};

    fn stored(query: &str) -> StoredRecommendation {
        StoredRecommendation {
            recommendation: Recommendation::new(query, None),
            needs: None,
        }
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let store = InMemoryRecommendationStore::default();
        let record = stored("train from Beijing to Shanghai");

        store.insert(record.clone()).expect("first insert");
        match store.insert(record) {
            Err(StoreError::Conflict) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn update_replaces_the_stored_record() {
        let store = InMemoryRecommendationStore::default();
        let mut record = stored("flight from Shanghai to Chengdu");
        store.insert(record.clone()).expect("insert");

        record
            .recommendation
            .set_status(RecommendationStatus::Completed);
        store.update(record.clone()).expect("update");

        let fetched = store
            .fetch(record.id())
            .expect("fetch")
            .expect("record present");
        assert_eq!(fetched.recommendation.status, RecommendationStatus::Completed);
    }
}
