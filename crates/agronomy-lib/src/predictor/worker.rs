//! Background retrain worker
//!
//! Receives drained learning batches over a bounded channel and runs each
//! refit on the blocking pool, so packet analysis never waits on a fit.

use super::manager::{MlManager, RetrainOutcome};
use crate::error::DatasetError;
use crate::health::{Component, HealthRegistry};
use crate::learning::LearningEntry;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// One drained learning buffer
#[derive(Debug)]
pub struct RetrainRequest {
    pub entries: Vec<LearningEntry>,
}

pub struct RetrainWorker {
    manager: Arc<MlManager>,
    rx: mpsc::Receiver<RetrainRequest>,
    health: Option<HealthRegistry>,
    completed: u64,
}

impl RetrainWorker {
    pub fn new(
        manager: Arc<MlManager>,
        rx: mpsc::Receiver<RetrainRequest>,
        health: Option<HealthRegistry>,
    ) -> Self {
        Self {
            manager,
            rx,
            health,
            completed: 0,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting retrain worker");

        loop {
            tokio::select! {
                request = self.rx.recv() => {
                    match request {
                        Some(request) => self.handle(request).await,
                        None => {
                            debug!("Retrain channel closed");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down retrain worker");
                    self.drain().await;
                    break;
                }
            }
        }

        info!(retrains = self.completed, "Retrain worker stopped");
    }

    /// Close the channel and finish batches already queued; later batches
    /// see a closed channel and retrain inline
    async fn drain(&mut self) {
        self.rx.close();
        let mut drained = 0;
        while let Some(request) = self.rx.recv().await {
            self.handle(request).await;
            drained += 1;
        }
        if drained > 0 {
            info!(drained, "Finished queued retrain batches");
        }
    }

    async fn handle(&mut self, request: RetrainRequest) {
        let manager = Arc::clone(&self.manager);
        let batch = request.entries.len();
        let result =
            tokio::task::spawn_blocking(move || manager.retrain_with(request.entries)).await;

        match result {
            Ok(Ok(RetrainOutcome::Swapped { version, rows, graduated })) => {
                self.completed += 1;
                info!(batch, rows, version = %version, graduated, "Background retrain applied");
                self.set_health(None).await;
                self.set_dataset_health(None).await;
            }
            Ok(Ok(RetrainOutcome::Rejected { candidate_mae, current_mae })) => {
                warn!(batch, candidate_mae, current_mae, "Background retrain rejected by holdout validation");
                self.set_health(Some(format!(
                    "last retrain rejected: holdout MAE {:.3} vs {:.3}",
                    candidate_mae, current_mae
                )))
                .await;
                self.set_dataset_health(None).await;
            }
            Ok(Err(e)) => {
                error!(batch, error = %format!("{:#}", e), "Background retrain failed");
                self.set_health(Some(format!("last retrain failed: {}", e))).await;
                if is_dataset_error(&e) {
                    self.set_dataset_health(Some(format!("{:#}", e))).await;
                }
            }
            Err(e) => {
                error!(batch, error = %e, "Retrain task panicked");
                self.set_health(Some("retrain task panicked".to_string())).await;
            }
        }
    }

    async fn set_dataset_health(&self, degraded: Option<String>) {
        if let Some(health) = &self.health {
            match degraded {
                Some(message) => health.set_degraded(Component::Dataset, message).await,
                None => health.set_healthy(Component::Dataset).await,
            }
        }
    }

    async fn set_health(&self, degraded: Option<String>) {
        if let Some(health) = &self.health {
            match degraded {
                Some(message) => health.set_degraded(Component::Retrainer, message).await,
                None => {
                    health.set_healthy(Component::Retrainer).await;
                    health.set_model(self.manager.model_summary()).await;
                }
            }
        }
    }
}

fn is_dataset_error(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| cause.is::<DatasetError>())
}
