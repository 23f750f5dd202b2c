use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

use super::domain::RecommendationId;
use super::repository::RecommendationStore;
use super::service::{
    RecommendationRequest, RecommendationResponse, RecommendationService, ReflectRequest,
};
use crate::error::AppError;

/// Router exposing recommendation creation, lookup and on-demand reflection.
pub fn recommendation_router<S>(service: Arc<RecommendationService<S>>) -> Router
where
    S: RecommendationStore + 'static,
{
    Router::new()
        .route("/api/v1/recommendations", post(create_handler::<S>))
        .route(
            "/api/v1/recommendations/:recommendation_id",
            get(fetch_handler::<S>),
        )
        .route(
            "/api/v1/recommendations/:recommendation_id/reflect",
            post(reflect_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn create_handler<S>(
    State(service): State<Arc<RecommendationService<S>>>,
    axum::Json(request): axum::Json<RecommendationRequest>,
) -> Response
where
    S: RecommendationStore + 'static,
{
    match service.recommend(request).await {
        Ok(record) => {
            let body = RecommendationResponse::from(record);
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn fetch_handler<S>(
    State(service): State<Arc<RecommendationService<S>>>,
    Path(recommendation_id): Path<String>,
) -> Response
where
    S: RecommendationStore + 'static,
{
    match service.get(&RecommendationId(recommendation_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record.recommendation)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn reflect_handler<S>(
    State(service): State<Arc<RecommendationService<S>>>,
    Path(recommendation_id): Path<String>,
    request: Option<axum::Json<ReflectRequest>>,
) -> Response
where
    S: RecommendationStore + 'static,
{
    let request = request.map(|axum::Json(request)| request).unwrap_or_default();
    match service
        .reflect(&RecommendationId(recommendation_id), request)
        .await
    {
        Ok(record) => {
            let body = RecommendationResponse::from(record);
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(error) => AppError::from(error).into_response(),
    }
}
