//! SEO pipeline endpoints
//!
//! Read endpoints for health, queue totals, sitemap slugs and the current plan,
//! plus the two mutating triggers normally driven by cron: plan application and
//! a queue processor run.

use axum::{extract::State, response::Json};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::indexing::ProcessSummary;
use crate::seo::{
    self, ApplyReport, ExecutionPlan, HealthState, IndexingStats, OpsSnapshot,
};
use crate::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlugList {
    pub slugs: Vec<String>,
}

/// Plan that was built and the outcome of applying it
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    pub plan: ExecutionPlan,
    pub report: ApplyReport,
}

#[utoipa::path(
    get,
    path = "/seo/health",
    responses(
        (status = 200, description = "Indexing queue health", body = HealthState)
    ),
    tag = "seo"
)]
pub async fn get_health(State(state): State<AppState>) -> Json<HealthState> {
    Json(seo::health_state(&state.db, &state.config).await)
}

#[utoipa::path(
    get,
    path = "/seo/stats",
    responses(
        (status = 200, description = "Indexing queue totals", body = IndexingStats),
        (status = 503, description = "Store unavailable", body = ApiError)
    ),
    tag = "seo"
)]
pub async fn get_indexing_stats(
    State(state): State<AppState>,
) -> Result<Json<IndexingStats>, ApiError> {
    Ok(Json(seo::indexing_stats(&state.db, &state.config).await?))
}

#[utoipa::path(
    get,
    path = "/seo/ops",
    responses(
        (status = 200, description = "Queue totals with recent failures and submissions", body = OpsSnapshot),
        (status = 503, description = "Store unavailable", body = ApiError)
    ),
    tag = "seo"
)]
pub async fn get_ops_snapshot(
    State(state): State<AppState>,
) -> Result<Json<OpsSnapshot>, ApiError> {
    Ok(Json(seo::ops_snapshot(&state.db, &state.config).await?))
}

#[utoipa::path(
    get,
    path = "/seo/slugs",
    responses(
        (status = 200, description = "Sorted indexable location keys", body = SlugList)
    ),
    tag = "seo"
)]
pub async fn get_indexable_slugs(State(state): State<AppState>) -> Json<SlugList> {
    Json(SlugList {
        slugs: seo::indexable_slugs(&state.db, &state.config).await,
    })
}

#[utoipa::path(
    get,
    path = "/seo/plan",
    responses(
        (status = 200, description = "Current execution plan (not applied)", body = ExecutionPlan)
    ),
    tag = "seo"
)]
pub async fn get_plan(State(state): State<AppState>) -> Json<ExecutionPlan> {
    Json(seo::get_seo_execution_plan(&state.db, &state.config).await)
}

/// Builds a fresh plan from current state and applies it.
#[utoipa::path(
    post,
    path = "/seo/plan/apply",
    responses(
        (status = 200, description = "Applied plan and per-action outcome", body = ApplyResponse)
    ),
    tag = "seo"
)]
pub async fn apply_plan(State(state): State<AppState>) -> Json<ApplyResponse> {
    let plan = seo::get_seo_execution_plan(&state.db, &state.config).await;
    let report = seo::apply_seo_execution_plan(&state.db, &state.config, &plan).await;
    info!(
        applied = report.applied_count(),
        skipped = report.skipped_count(),
        "plan applied via API"
    );
    Json(ApplyResponse { plan, report })
}

#[utoipa::path(
    post,
    path = "/seo/queue/process",
    responses(
        (status = 200, description = "Queue processor run summary", body = ProcessSummary)
    ),
    tag = "seo"
)]
pub async fn process_queue(State(state): State<AppState>) -> Json<ProcessSummary> {
    Json(state.processor.run().await)
}
