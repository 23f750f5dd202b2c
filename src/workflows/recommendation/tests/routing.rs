use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;

use crate::workflows::recommendation::recommendation_router;
use crate::workflows::recommendation::router::{create_handler, fetch_handler};
use crate::workflows::recommendation::service::{RecommendationRequest, RecommendationService};
use crate::workflows::recommendation::RefinementSettings;

fn json_request(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn create_route_returns_recommendation_envelope() {
    let (service, _) = scenario_service();
    let router = recommendation_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "/api/v1/recommendations",
            json!({ "conversation_text": "Beijing to Shanghai by train", "user_id": "u-1" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("completed"));
    assert_eq!(payload["recommendation_id"], payload["recommendation"]["recommendation_id"]);
    assert_eq!(payload["recommendation"]["options"][0]["ticket"]["mode"], json!("train"));
    assert_eq!(
        payload["recommendation"]["options"][0]["ticket"]["seat_class"],
        json!("high_speed_second")
    );
    assert_eq!(
        payload["recommendation"]["options"][0]["ticket"]["departure_time"],
        json!("2026-03-02T07:00:00")
    );
    assert!(payload["processing_time_ms"].is_number());
}

#[tokio::test]
async fn create_handler_rejects_out_of_range_threshold() {
    let (service, _) = scenario_service();
    let mut request = RecommendationRequest::new("Beijing to Shanghai");
    request.score_threshold = Some(101.0);

    let response = create_handler(State(Arc::new(service)), axum::Json(request)).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("score_threshold"));
}

#[tokio::test]
async fn create_handler_reports_store_failures() {
    let service = RecommendationService::new(
        Arc::new(rule_controller(
            Arc::new(SequenceSupplier::always(varied_tickets())),
            Arc::new(RecordingReflector::default()),
        )),
        Arc::new(UnavailableStore),
        RefinementSettings::default(),
    );

    let response = create_handler(
        State(Arc::new(service)),
        axum::Json(RecommendationRequest::new("Beijing to Shanghai")),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn fetch_handler_returns_not_found_for_unknown_ids() {
    let (service, _) = scenario_service();

    let response = fetch_handler(State(Arc::new(service)), Path("nope".to_string())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stored_recommendations_can_be_fetched_and_reflected() {
    let (service, _) = scenario_service();
    let service = Arc::new(service);
    let record = service
        .recommend(RecommendationRequest::new("Beijing to Shanghai"))
        .await
        .expect("recommendation succeeds");
    let id = record.id().to_string();

    let fetched = recommendation_router(service.clone())
        .oneshot(
            Request::get(format!("/api/v1/recommendations/{id}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(fetched.status(), StatusCode::OK);
    let payload = read_json_body(fetched).await;
    assert_eq!(payload["recommendation_id"], json!(id));

    let reflected = recommendation_router(service)
        .oneshot(
            Request::post(format!("/api/v1/recommendations/{id}/reflect"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(reflected.status(), StatusCode::OK);
    let payload = read_json_body(reflected).await;
    assert_eq!(payload["recommendation_id"], json!(id));
    assert_eq!(payload["recommendation"]["reflection_iterations"], json!(1));
}

#[tokio::test]
async fn reflect_route_returns_not_found_for_unknown_ids() {
    let (service, _) = scenario_service();

    let response = recommendation_router(Arc::new(service))
        .oneshot(json_request(
            "/api/v1/recommendations/missing/reflect",
            json!({ "feedback": "cheaper please" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
