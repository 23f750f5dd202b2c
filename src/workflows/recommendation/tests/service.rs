use std::sync::Arc;

use serde_json::json;

use super::common::*;

use crate::workflows::recommendation::controller::RefinementSettings;
use crate::workflows::recommendation::domain::{RecommendationId, RecommendationStatus};
use crate::workflows::recommendation::extractor::KeywordNeedsExtractor;
use crate::workflows::recommendation::quality::QualityEvaluator;
use crate::workflows::recommendation::repository::{RecommendationStore, StoreError};
use crate::workflows::recommendation::service::{
    RecommendationRequest, RecommendationService, RecommendationServiceError, ReflectRequest,
};

#[tokio::test]
async fn recommend_stores_the_final_recommendation() {
    let (service, store) = scenario_service();

    let record = service
        .recommend(RecommendationRequest::new("Beijing to Shanghai by train"))
        .await
        .expect("recommendation succeeds");

    assert_eq!(record.recommendation.status, RecommendationStatus::Completed);
    assert!(record.needs.is_some());
    let stored = store
        .fetch(record.id())
        .expect("store reachable")
        .expect("record stored");
    assert_eq!(stored.recommendation, record.recommendation);

    let fetched = service.get(record.id()).expect("record found");
    assert_eq!(fetched.recommendation.recommendation_id, record.recommendation.recommendation_id);
}

#[tokio::test]
async fn request_overrides_are_validated() {
    let (service, _) = scenario_service();

    let blank = RecommendationRequest::new("   ");
    let mut zero_iterations = RecommendationRequest::new("Beijing to Shanghai");
    zero_iterations.max_iterations = Some(0);
    let mut threshold = RecommendationRequest::new("Beijing to Shanghai");
    threshold.score_threshold = Some(120.0);

    for request in [blank, zero_iterations, threshold] {
        match service.recommend(request).await {
            Err(RecommendationServiceError::InvalidRequest(_)) => {}
            other => panic!("expected invalid request, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn request_overrides_bound_the_loop() {
    let reflector = Arc::new(RecordingReflector::default());
    let (service, _) = build_service(judged_controller(
        &[70.0],
        Arc::new(SequenceSupplier::always(scenario_tickets())),
        reflector.clone(),
    ));

    let mut request = RecommendationRequest::new("Beijing to Shanghai");
    request.max_iterations = Some(1);
    request.score_threshold = Some(75.0);
    let record = service.recommend(request).await.expect("recommendation succeeds");

    assert_eq!(record.recommendation.reflection_iterations, 1);
    assert_eq!(reflector.call_count(), 1);
    assert_eq!(service.settings(), &RefinementSettings::default());
}

#[tokio::test]
async fn panics_become_failed_recommendations() {
    let (service, _) = build_service(controller(
        Arc::new(PanickingExtractor),
        Arc::new(SequenceSupplier::always(scenario_tickets())),
        Arc::new(RecordingReflector::default()),
        QualityEvaluator::rule_based(),
    ));

    let record = service
        .recommend(RecommendationRequest::new("Beijing to Shanghai"))
        .await
        .expect("panic is contained");

    assert_eq!(record.recommendation.status, RecommendationStatus::Failed);
    assert_eq!(record.recommendation.metadata.get("panicked"), Some(&json!(true)));
    assert!(record.recommendation.metadata.contains_key("error"));
    assert!(record.needs.is_none());
}

#[tokio::test]
async fn unknown_recommendations_are_not_found() {
    let (service, _) = scenario_service();

    match service.get(&RecommendationId("missing".to_string())) {
        Err(RecommendationServiceError::NotFound(id)) => assert_eq!(id, "missing"),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[tokio::test]
async fn reflect_with_feedback_re_extracts_needs() {
    let supplier = Arc::new(SequenceSupplier::always(scenario_tickets()));
    let (service, store) = build_service(controller(
        Arc::new(KeywordNeedsExtractor::new()),
        supplier.clone(),
        Arc::new(RecordingReflector::default()),
        QualityEvaluator::rule_based(),
    ));

    let mut request = RecommendationRequest::new("train from Beijing to Shanghai");
    request.max_iterations = Some(1);
    let first = service.recommend(request).await.expect("recommendation succeeds");
    let iterations = first.recommendation.reflection_iterations;

    let reflected = service
        .reflect(
            first.id(),
            ReflectRequest {
                feedback: Some("keep it under 800 please".to_string()),
            },
        )
        .await
        .expect("reflection succeeds");

    assert_eq!(reflected.id(), first.id());
    assert_eq!(reflected.recommendation.created_at, first.recommendation.created_at);
    assert_eq!(reflected.recommendation.reflection_iterations, iterations + 1);
    assert_eq!(
        reflected.recommendation.metadata.get("traveler_feedback"),
        Some(&json!("keep it under 800 please"))
    );
    let latest = supplier.seen().pop().expect("supplier called");
    assert_eq!(latest.budget.max_price, Some(800.0));
    assert_eq!(latest.departure_city, "Beijing");

    let stored = store
        .fetch(first.id())
        .expect("store reachable")
        .expect("record stored");
    assert_eq!(stored.recommendation.reflection_iterations, iterations + 1);
}

#[tokio::test]
async fn reflect_without_feedback_reuses_stored_needs() {
    let supplier = Arc::new(SequenceSupplier::always(scenario_tickets()));
    let (service, _) = build_service(rule_controller(
        supplier.clone(),
        Arc::new(RecordingReflector::default()),
    ));

    let first = service
        .recommend(RecommendationRequest::new("Beijing to Shanghai"))
        .await
        .expect("recommendation succeeds");
    let reflected = service
        .reflect(first.id(), ReflectRequest::default())
        .await
        .expect("reflection succeeds");

    let seen = supplier.seen();
    assert_eq!(seen.last(), first.needs.as_ref());
    assert!(reflected
        .recommendation
        .metadata
        .get("traveler_feedback")
        .is_none());
}

#[tokio::test]
async fn store_failures_surface_as_service_errors() {
    let service = RecommendationService::new(
        Arc::new(rule_controller(
            Arc::new(SequenceSupplier::always(scenario_tickets())),
            Arc::new(RecordingReflector::default()),
        )),
        Arc::new(UnavailableStore),
        RefinementSettings::default(),
    );

    match service
        .recommend(RecommendationRequest::new("Beijing to Shanghai"))
        .await
    {
        Err(RecommendationServiceError::Store(StoreError::Unavailable(_))) => {}
        other => panic!("expected store failure, got {other:?}"),
    }
}
