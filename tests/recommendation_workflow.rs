use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use ticket_reflect::workflows::recommendation::{
    CancellationFlag, HeuristicReflector, KeywordNeedsExtractor, MockCandidateSupplier,
    QualityEvaluator, RecommendationId, RecommendationRequest, RecommendationService,
    RecommendationStatus, RecommendationStore, RefinementController, RefinementSettings,
    ReflectRequest, StopReason, StoreError, StoredRecommendation,
};

const BEIJING_TO_SHANGHAI: &str =
    "I need a train from Beijing to Shanghai on 2026-03-02 in the morning, budget under 1000";

fn offline_controller(seed: u64) -> RefinementController {
    let anchor = NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid anchor date");
    RefinementController::new(
        Arc::new(KeywordNeedsExtractor::new()),
        Arc::new(MockCandidateSupplier::new(seed).anchored_at(anchor)),
        Arc::new(HeuristicReflector::new()),
        QualityEvaluator::rule_based(),
    )
}

#[derive(Default, Clone)]
struct SharedStore {
    records: Arc<Mutex<HashMap<RecommendationId, StoredRecommendation>>>,
}

impl RecommendationStore for SharedStore {
    fn insert(&self, record: StoredRecommendation) -> Result<StoredRecommendation, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: StoredRecommendation) -> Result<(), StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard.insert(record.id().clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &RecommendationId) -> Result<Option<StoredRecommendation>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[tokio::test]
async fn offline_pipeline_returns_bounded_ranked_recommendation() {
    let controller = offline_controller(11);
    let settings = RefinementSettings::new(3, 85.0);

    let outcome = controller
        .recommend(BEIJING_TO_SHANGHAI, None, &settings, &CancellationFlag::new())
        .await;
    let recommendation = outcome.recommendation;

    assert_eq!(recommendation.status, RecommendationStatus::Completed);
    assert_eq!(outcome.needs.departure_city, "Beijing");
    assert_eq!(outcome.needs.arrival_city, "Shanghai");
    assert!(!recommendation.options.is_empty());
    assert!(recommendation.options.len() <= settings.max_options);

    let ranks: Vec<usize> = recommendation.options.iter().map(|option| option.rank).collect();
    let expected: Vec<usize> = (1..=recommendation.options.len()).collect();
    assert_eq!(ranks, expected, "ranks are dense and start at one");
    assert!(recommendation
        .options
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));

    assert!(recommendation.reflection_iterations <= settings.max_iterations);
    assert_eq!(
        recommendation.reflection_history.len() as u32,
        recommendation.reflection_iterations
    );
    assert!(recommendation.metadata.contains_key("selected_iteration"));
    assert!(matches!(
        outcome.stop_reason,
        StopReason::ThresholdMet | StopReason::IterationBudgetExhausted
    ));
    assert!(recommendation.processing_time_ms.is_some());
}

#[tokio::test]
async fn zero_threshold_stops_after_the_first_evaluation() {
    let controller = offline_controller(3);
    let settings = RefinementSettings::new(3, 0.0);

    let outcome = controller
        .recommend(BEIJING_TO_SHANGHAI, None, &settings, &CancellationFlag::new())
        .await;

    assert_eq!(outcome.stop_reason, StopReason::ThresholdMet);
    assert_eq!(outcome.recommendation.reflection_iterations, 0);
    assert!(outcome.recommendation.reflection_history.is_empty());
}

#[tokio::test]
async fn direct_request_only_ranks_direct_services() {
    let controller = offline_controller(5);
    let settings = RefinementSettings::new(2, 100.0);

    let outcome = controller
        .recommend(
            "direct train from Beijing to Wuhan please",
            None,
            &settings,
            &CancellationFlag::new(),
        )
        .await;

    assert_eq!(outcome.needs.max_transfers, Some(0));
    assert!(!outcome.recommendation.options.is_empty());
    assert!(outcome
        .recommendation
        .options
        .iter()
        .all(|option| option.ticket.is_direct()));
}

#[tokio::test]
async fn cancelled_request_fails_without_options() {
    let controller = offline_controller(9);
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let outcome = controller
        .recommend(BEIJING_TO_SHANGHAI, None, &RefinementSettings::default(), &cancel)
        .await;

    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(outcome.recommendation.status, RecommendationStatus::Failed);
    assert!(outcome.recommendation.options.is_empty());
}

#[tokio::test]
async fn stored_recommendation_accepts_one_more_reflection() {
    let store = SharedStore::default();
    let service = RecommendationService::new(
        Arc::new(offline_controller(21)),
        Arc::new(store.clone()),
        RefinementSettings::new(1, 100.0),
    );

    let created = service
        .recommend(RecommendationRequest::new(BEIJING_TO_SHANGHAI))
        .await
        .expect("recommendation stored");
    let id = created.id().clone();
    let before = created.recommendation.reflection_iterations;

    let reflected = service
        .reflect(&id, ReflectRequest::default())
        .await
        .expect("reflection applied");

    assert_eq!(reflected.id(), &id);
    assert_eq!(
        reflected.recommendation.created_at,
        created.recommendation.created_at
    );
    assert_eq!(reflected.recommendation.reflection_iterations, before + 1);
    assert_eq!(
        reflected.recommendation.reflection_history.len() as u32,
        before + 1
    );

    let stored = service.get(&id).expect("still stored");
    assert_eq!(stored.recommendation.reflection_iterations, before + 1);
}
