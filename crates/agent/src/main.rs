//! Agronomy Agent - per-farm decision engine host
//!
//! Reads telemetry and pump events as JSON lines on stdin, writes one
//! analysis result per telemetry line to stdout, and serves health and
//! Prometheus endpoints. Logs go to stderr.

use agronomy_lib::{
    engine::AgronomyEngine,
    health::{Component, HealthRegistry},
    observability::{EngineMetrics, StructuredLogger},
    predictor::MlManager,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod ingest;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter; stdout carries results
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("Starting agronomy-agent");

    // Load configuration
    let config = config::AgentConfig::load()?;
    info!(farm_id = %config.farm_id, crop = %config.crop, "Agent configured");

    let health_registry = HealthRegistry::with_components();

    // Initialize metrics
    let metrics = EngineMetrics::new();
    metrics.set_learning_buffer_items(0);

    let logger = StructuredLogger::new(&config.farm_id);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Manager and retrain worker
    let manager = Arc::new(MlManager::new(config.ml_config()).with_logger(logger.clone()));
    let worker_handle =
        manager.spawn_worker(Some(health_registry.clone()), shutdown_tx.subscribe());

    // Engine init loads or fits models, keep it off the async workers
    let engine = AgronomyEngine::new(config.engine_config(), Arc::clone(&manager));
    let (mut engine, outcome, dataset) = tokio::task::spawn_blocking(move || {
        let outcome = engine.init();
        let dataset = engine.manager().check_dataset();
        (engine, outcome, dataset)
    })
    .await
    .context("Engine initialization task failed")?;

    match outcome {
        Some(outcome) => {
            info!(outcome = ?outcome, model_version = ?manager.model_version(), "Models loaded");
            health_registry.set_healthy(Component::Models).await;
            health_registry.set_model(manager.model_summary()).await;
        }
        None => {
            health_registry
                .set_degraded(Component::Models, "running without models")
                .await;
        }
    }

    match dataset {
        Ok(rows) => {
            info!(rows, "Training dataset readable");
            health_registry.set_healthy(Component::Dataset).await;
        }
        Err(e) => {
            warn!(error = %e, "Training dataset unreadable, retrains will fail");
            health_registry
                .set_degraded(Component::Dataset, e.to_string())
                .await;
        }
    }

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));

    health_registry.set_initialized(true).await;

    // Start health and metrics server
    let api_port = config.api_port;
    let api_shutdown = shutdown_tx.subscribe();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state, api_shutdown).await {
            error!(error = %e, "API server failed");
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let reason = tokio::select! {
        result = ingest::process_lines(&mut engine, stdin, stdout) => {
            match result {
                Ok(summary) => {
                    info!(
                        packets = summary.packets,
                        pump_events = summary.pump_events,
                        malformed = summary.malformed,
                        "Input closed"
                    );
                    "stdin closed"
                }
                Err(e) => {
                    error!(error = %format!("{:#}", e), "Input loop failed");
                    health_registry
                        .set_unhealthy(Component::Engine, "input loop failed")
                        .await;
                    "input error"
                }
            }
        }
        _ = tokio::signal::ctrl_c() => "SIGINT received",
    };

    info!(reason, "Shutting down");
    health_registry.set_initialized(false).await;
    let _ = shutdown_tx.send(());
    engine.shutdown(reason);

    if let Err(e) = worker_handle.await {
        error!(error = %e, "Retrain worker task failed");
    }
    if let Err(e) = api_handle.await {
        error!(error = %e, "API server task failed");
    }

    Ok(())
}
