//! # Tests for Handlers

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use serde_json::Value;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::handlers::root;
use crate::indexing::{IndexingApi, QueueProcessor};
use crate::revenue::RevenueScoringEngine;
use crate::server::{AppState, create_app};

struct UnconfiguredApi;

#[async_trait]
impl IndexingApi for UnconfiguredApi {
    fn is_configured(&self) -> bool {
        false
    }

    async fn access_token(&self) -> Result<String, PipelineError> {
        Err(PipelineError::Configuration("not configured".into()))
    }

    async fn publish(&self, _access_token: &str, _url: &str) -> Result<(), PipelineError> {
        Err(PipelineError::Configuration("not configured".into()))
    }
}

async fn test_state() -> AppState {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let config = Arc::new(AppConfig::default());
    AppState {
        processor: QueueProcessor::new(db.clone(), config.clone(), Arc::new(UnconfiguredApi)),
        revenue: Arc::new(RevenueScoringEngine::new(db.clone(), config.revenue.clone())),
        config,
        db,
    }
}

async fn get_json(state: AppState, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = create_app(state)
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_root_handler_returns_service_info() {
    let axum::Json(info) = root().await;
    assert_eq!(info.service, "seo-pipeline");
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_endpoint_on_empty_queue() {
    let (status, body) = get_json(test_state().await, "GET", "/seo/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["flags"]["backlogTooLarge"], false);
    assert!(body["reason"].is_null());
}

#[tokio::test]
async fn test_plan_endpoint_reports_disabled_system() {
    // The migration seeds the kill switch as disabled
    let (status, body) = get_json(test_state().await, "GET", "/seo/plan").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["healthBlocked"], true);
    assert_eq!(body["meta"]["reason"], "SEO system disabled");
    assert_eq!(body["promote"]["reindex"], serde_json::json!([]));
}

#[tokio::test]
async fn test_process_endpoint_is_blocked_when_disabled() {
    let (status, body) = get_json(test_state().await, "POST", "/seo/queue/process").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blocked"], true);
    assert_eq!(body["processed"], 0);
}

#[tokio::test]
async fn test_stats_and_ops_endpoints() {
    let state = test_state().await;

    let (status, stats) = get_json(state.clone(), "GET", "/seo/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 0);

    let (status, ops) = get_json(state, "GET", "/seo/ops").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ops["total"], 0);
    assert!(ops["recentFailures"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_revenue_endpoint_scores_unknown_entity_as_zero() {
    let (status, body) = get_json(test_state().await, "GET", "/revenue/hotel-42").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["entityId"], "hotel-42");
    assert_eq!(body["stats"]["clicks"], 0);
    assert_eq!(body["shouldHide"], false);
}

#[tokio::test]
async fn test_revenue_endpoint_rejects_blank_entity() {
    let (status, body) = get_json(test_state().await, "GET", "/revenue/%20%20").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(body["details"]["field"], "entityId");
}

#[tokio::test]
async fn test_slugs_endpoint_returns_empty_list() {
    let (status, body) = get_json(test_state().await, "GET", "/seo/slugs").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slugs"], serde_json::json!([]));
}
