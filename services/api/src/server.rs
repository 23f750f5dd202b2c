use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState, InMemoryRecommendationStore};
use crate::routes::with_recommendation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use ticket_reflect::config::AppConfig;
use ticket_reflect::error::AppError;
use ticket_reflect::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryRecommendationStore::default());
    let service = build_service(&config, store);

    let app = with_recommendation_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_iterations = config.refinement.max_iterations,
        score_threshold = config.refinement.score_threshold,
        model_backed = config.llm.is_some(),
        "ticket recommendation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
