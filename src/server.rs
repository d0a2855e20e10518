//! # Server Configuration
//!
//! Thin HTTP wrapper exposing the pipeline operations.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::handlers;
use crate::indexing::QueueProcessor;
use crate::revenue::RevenueScoringEngine;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub processor: QueueProcessor,
    pub revenue: Arc<RevenueScoringEngine>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/seo/health", get(handlers::seo::get_health))
        .route("/seo/ops", get(handlers::seo::get_ops_snapshot))
        .route("/seo/stats", get(handlers::seo::get_indexing_stats))
        .route("/seo/slugs", get(handlers::seo::get_indexable_slugs))
        .route("/seo/plan", get(handlers::seo::get_plan))
        .route("/seo/plan/apply", post(handlers::seo::apply_plan))
        .route("/seo/queue/process", post(handlers::seo::process_queue))
        .route("/revenue/{entity_id}", get(handlers::revenue::get_revenue_score))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Serves until `shutdown` is cancelled.
pub async fn run_server(
    config: Arc<AppConfig>,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::seo::get_health,
        crate::handlers::seo::get_ops_snapshot,
        crate::handlers::seo::get_indexing_stats,
        crate::handlers::seo::get_indexable_slugs,
        crate::handlers::seo::get_plan,
        crate::handlers::seo::apply_plan,
        crate::handlers::seo::process_queue,
        crate::handlers::revenue::get_revenue_score,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::seo::HealthState,
            crate::seo::HealthFlags,
            crate::seo::IndexingStats,
            crate::seo::OpsSnapshot,
            crate::seo::ExecutionPlan,
            crate::seo::ApplyReport,
            crate::seo::ActionOutcome,
            crate::indexing::ProcessSummary,
            crate::revenue::RevenueScore,
            crate::revenue::EntityRevenue,
            crate::handlers::seo::SlugList,
            crate::handlers::seo::ApplyResponse,
        )
    ),
    info(
        title = "SEO Pipeline API",
        description = "Revenue-driven SEO promotion and indexing pipeline",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
