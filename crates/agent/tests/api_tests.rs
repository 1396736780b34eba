//! Integration tests for the agent API endpoints

use agronomy_lib::{
    health::{Component, HealthRegistry, ModelSummary},
    observability::EngineMetrics,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

#[allow(dead_code)]
#[path = "../src/api.rs"]
mod api;

use api::{create_router, AppState};

fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::with_components();
    let metrics = EngineMetrics::new();
    let state = Arc::new(AppState::new(health_registry, metrics));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app();

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_without_models() {
    let (app, state) = setup_test_app();

    state
        .health
        .set_degraded(Component::Models, "running without models")
        .await;

    // Degraded still returns 200 (operational)
    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["models"]["message"],
        "running without models"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app();

    state
        .health
        .set_unhealthy(Component::Engine, "input loop failed")
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app();

    // Not ready until the engine has initialized
    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app();
    state.health.set_initialized(true).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app();

    state.health.set_initialized(true).await;
    state
        .health
        .set_unhealthy(Component::Dataset, "dataset unreadable")
        .await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["reason"], "dataset unhealthy: dataset unreadable");
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app();

    state.metrics.observe_analysis_latency(0.001);
    state.metrics.inc_packets_analyzed();
    state.metrics.add_decisions_emitted(3);
    state.metrics.set_learning_buffer_items(12);
    state.metrics.set_model_version("v1", "bootstrap");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("agronomy_analysis_latency_seconds"));
    assert!(metrics_text.contains("agronomy_packets_analyzed_total"));
    assert!(metrics_text.contains("agronomy_decisions_emitted_total"));
    assert!(metrics_text.contains("agronomy_learning_buffer_items 12"));
    assert!(metrics_text.contains("agronomy_model_version_info"));
    assert!(metrics_text.contains("origin=\"bootstrap\""));
}

#[tokio::test]
async fn test_metrics_contains_histogram_buckets() {
    let (app, state) = setup_test_app();

    state.metrics.observe_retrain_latency(0.5);
    state.metrics.observe_retrain_latency(2.0);

    let (_status, body) = get(app, "/metrics").await;
    let metrics_text = String::from_utf8(body).unwrap();

    assert!(metrics_text.contains("agronomy_retrain_latency_seconds_bucket"));
    assert!(metrics_text.contains("agronomy_retrain_latency_seconds_count"));
    assert!(metrics_text.contains("agronomy_retrain_latency_seconds_sum"));
}

#[tokio::test]
async fn test_healthz_includes_component_details() {
    let (app, _state) = setup_test_app();

    let (_status, body) = get(app, "/healthz").await;
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(health["components"].is_object());
    for component in Component::ALL {
        assert!(
            health["components"][component.as_str()].is_object(),
            "missing {}",
            component
        );
    }
    assert!(health.get("model").is_none());
}

#[tokio::test]
async fn test_healthz_reports_active_model() {
    let (app, state) = setup_test_app();
    state
        .health
        .set_model(Some(ModelSummary {
            version: "v3".to_string(),
            is_bootstrapped: false,
            training_rows: 5100,
        }))
        .await;

    let (_status, body) = get(app, "/healthz").await;
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["model"]["version"], "v3");
    assert_eq!(health["model"]["is_bootstrapped"], false);
}
