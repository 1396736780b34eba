//! Streaming ML manager
//!
//! Owns the active [`ModelBundle`], the learning buffer and the training
//! dataset. Startup follows a fixed precedence:
//!
//! 1. model artifacts on disk (unless `force_retrain`) are loaded as-is
//! 2. otherwise an existing training dataset is fitted
//! 3. otherwise synthetic data is generated, persisted and fitted; a dataset
//!    too short to fit is kept and topped up with the synthetic rows
//!
//! Inference reads the bundle through an `RwLock<Option<Arc<_>>>`, so a
//! retrain finishing on another thread swaps the whole bundle at once and
//! in-flight predictions keep the bundle they started with.

use super::bundle::{ModelBundle, TrainingParams, MANIFEST_FILE};
use super::features::{DiseaseFeatures, DISEASE_FEATURES, NUTRIENT_FEATURES, WATER_FEATURES};
use super::inference::{
    ensure_finite, nutrient_prediction, DiseasePrediction, WaterDemandPrediction,
};
use super::regression::{Model, MIN_TRAINING_ROWS};
use super::worker::{RetrainRequest, RetrainWorker};
use crate::error::{DatasetError, PredictionError, ValidationError};
use crate::health::{HealthRegistry, ModelSummary};
use crate::learning::{
    label_batch, validate_packet, BootstrapConfig, LearningBuffer, LearningBufferStats,
    LearningEntry, SyntheticDataGenerator, TrainingDataset, TrainingRow,
    DEFAULT_BOOTSTRAP_ROWS, DEFAULT_LEARNING_CAPACITY, MAX_DATASET_ROWS,
};
use crate::models::SensorPacket;
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::soil::NpkLevels;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Configuration for the ML manager
#[derive(Debug, Clone)]
pub struct MlConfig {
    /// Directory holding the model artifacts and manifest
    pub model_dir: PathBuf,
    /// CSV training dataset
    pub dataset_path: PathBuf,
    /// Validated packets collected before a retrain
    pub buffer_capacity: usize,
    pub max_dataset_rows: usize,
    pub bootstrap_rows: usize,
    /// Seed for synthetic data; entropy when `None`
    pub bootstrap_seed: Option<u64>,
    /// Refit on startup even when artifacts exist
    pub force_retrain: bool,
    /// Most recent share of the dataset held out for retrain validation
    pub holdout_fraction: f64,
    /// Reject a retrain whose holdout water MAE is worse by more than this share
    pub max_mae_regression: f64,
    /// Pending retrain batches before new ones are dropped
    pub retrain_queue_size: usize,
    pub training: TrainingParams,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            dataset_path: PathBuf::from("data/training_data.csv"),
            buffer_capacity: DEFAULT_LEARNING_CAPACITY,
            max_dataset_rows: MAX_DATASET_ROWS,
            bootstrap_rows: DEFAULT_BOOTSTRAP_ROWS,
            bootstrap_seed: Some(42),
            force_retrain: false,
            holdout_fraction: 0.2,
            max_mae_regression: 0.2,
            retrain_queue_size: 8,
            training: TrainingParams::default(),
        }
    }
}

/// How `init` obtained the active bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitOutcome {
    Loaded,
    TrainedFromDataset,
    Bootstrapped,
}

/// Result of one retrain attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetrainOutcome {
    Swapped {
        version: String,
        rows: usize,
        graduated: bool,
    },
    Rejected {
        candidate_mae: f64,
        current_mae: f64,
    },
}

/// What happened to a packet offered to the learning pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Buffered { len: usize },
    RetrainQueued,
    /// Worker queue full; the batch was discarded
    RetrainDropped,
    Retrained(RetrainOutcome),
    RetrainFailed(String),
}

/// Snapshot of manager state
#[derive(Debug, Clone, Serialize)]
pub struct MlStats {
    pub models_loaded: bool,
    pub is_bootstrapped: bool,
    pub model_version: Option<String>,
    pub training_rows: Option<usize>,
    pub disease_model: bool,
    pub buffer: LearningBufferStats,
}

pub struct MlManager {
    config: MlConfig,
    bundle: RwLock<Option<Arc<ModelBundle>>>,
    buffer: Mutex<LearningBuffer>,
    retrain_tx: Mutex<Option<mpsc::Sender<RetrainRequest>>>,
    /// Serializes dataset read-modify-write
    dataset_lock: Mutex<()>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl std::fmt::Debug for MlManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlManager")
            .field("model_dir", &self.config.model_dir)
            .field("models_loaded", &self.models_loaded())
            .finish()
    }
}

impl MlManager {
    pub fn new(config: MlConfig) -> Self {
        let buffer = LearningBuffer::new(config.buffer_capacity);
        Self {
            config,
            bundle: RwLock::new(None),
            buffer: Mutex::new(buffer),
            retrain_tx: Mutex::new(None),
            dataset_lock: Mutex::new(()),
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new("default"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &MlConfig {
        &self.config
    }

    /// Load, fit or bootstrap the models
    pub fn init(&self) -> Result<InitOutcome> {
        if !self.config.force_retrain && ModelBundle::exists(&self.config.model_dir) {
            match ModelBundle::load(&self.config.model_dir) {
                Ok(bundle) => {
                    info!(
                        version = %bundle.version(),
                        is_bootstrapped = bundle.is_bootstrapped,
                        "Loaded model bundle from disk"
                    );
                    self.install(bundle);
                    return Ok(InitOutcome::Loaded);
                }
                Err(e) => {
                    warn!(
                        dir = %self.config.model_dir.display(),
                        error = %e,
                        "Model artifacts unusable, treating as absent"
                    );
                }
            }
        }

        let dataset = self.open_dataset()?;
        if dataset.len() >= MIN_TRAINING_ROWS {
            let bootstrapped = self.previous_bootstrap_flag();
            let generation = self.previous_generation() + 1;
            let bundle = ModelBundle::fit(dataset.rows(), &self.config.training, generation, bootstrapped)
                .context("Failed to fit models from training dataset")?;
            bundle
                .save(&self.config.model_dir)
                .context("Failed to save model artifacts")?;
            self.install(bundle);
            return Ok(InitOutcome::TrainedFromDataset);
        }

        if !dataset.is_empty() {
            warn!(
                rows = dataset.len(),
                min_rows = MIN_TRAINING_ROWS,
                "Training dataset too small to fit, topping up with synthetic rows"
            );
        }
        self.bootstrap_with(dataset.rows().to_vec())?;
        Ok(InitOutcome::Bootstrapped)
    }

    /// Replace the dataset with synthetic rows and fit a bootstrapped bundle
    pub fn bootstrap(&self) -> Result<Arc<ModelBundle>> {
        self.bootstrap_with(Vec::new())
    }

    /// Synthetic rows first, then `field_rows` as the most recent data
    fn bootstrap_with(&self, field_rows: Vec<TrainingRow>) -> Result<Arc<ModelBundle>> {
        let _guard = self.dataset_lock.lock().unwrap_or_else(PoisonError::into_inner);

        info!(
            rows = self.config.bootstrap_rows,
            field_rows = field_rows.len(),
            "Bootstrapping synthetic dataset"
        );
        let rows = SyntheticDataGenerator::new(BootstrapConfig {
            rows: self.config.bootstrap_rows,
            seed: self.config.bootstrap_seed,
            ..Default::default()
        })
        .generate();

        let mut dataset = TrainingDataset::new(&self.config.dataset_path)
            .with_max_rows(self.config.max_dataset_rows);
        dataset.append(rows);
        dataset.append(field_rows);
        dataset
            .save()
            .with_context(|| format!("Failed to write dataset {:?}", self.config.dataset_path))?;

        let generation = self.previous_generation() + 1;
        let bundle = ModelBundle::fit(dataset.rows(), &self.config.training, generation, true)
            .context("Failed to fit bootstrap models")?;
        bundle
            .save(&self.config.model_dir)
            .context("Failed to save model artifacts")?;
        Ok(self.install(bundle))
    }

    /// Refit on the current dataset and swap in unconditionally
    pub fn train_from_dataset(&self) -> Result<Arc<ModelBundle>> {
        let _guard = self.dataset_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let dataset = self.open_dataset()?;
        dataset.ensure_not_empty()?;

        let bootstrapped = self
            .current_bundle()
            .map(|b| b.is_bootstrapped)
            .unwrap_or_else(|| self.previous_bootstrap_flag());
        let generation = self.previous_generation() + 1;
        let bundle = ModelBundle::fit(dataset.rows(), &self.config.training, generation, bootstrapped)
            .context("Failed to fit models from training dataset")?;
        bundle
            .save(&self.config.model_dir)
            .context("Failed to save model artifacts")?;
        Ok(self.install(bundle))
    }

    fn open_dataset(&self) -> Result<TrainingDataset> {
        Ok(TrainingDataset::open(&self.config.dataset_path)
            .with_context(|| format!("Failed to read dataset {:?}", self.config.dataset_path))?
            .with_max_rows(self.config.max_dataset_rows))
    }

    /// Bootstrap flag recorded in the manifest on disk, if readable
    fn previous_bootstrap_flag(&self) -> bool {
        self.read_manifest_field("is_bootstrapped")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn previous_generation(&self) -> u64 {
        self.current_bundle()
            .map(|b| b.generation)
            .or_else(|| self.read_manifest_field("generation").and_then(|v| v.as_u64()))
            .unwrap_or(0)
    }

    fn read_manifest_field(&self, field: &str) -> Option<serde_json::Value> {
        let bytes = std::fs::read(self.config.model_dir.join(MANIFEST_FILE)).ok()?;
        let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
        value.get(field).cloned()
    }

    fn install(&self, bundle: ModelBundle) -> Arc<ModelBundle> {
        let bundle = Arc::new(bundle);
        let origin = if bundle.is_bootstrapped { "bootstrap" } else { "field" };
        self.metrics.set_model_version(&bundle.version(), origin);
        *self.bundle.write().unwrap_or_else(PoisonError::into_inner) = Some(bundle.clone());
        bundle
    }

    pub fn current_bundle(&self) -> Option<Arc<ModelBundle>> {
        self.bundle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn models_loaded(&self) -> bool {
        self.current_bundle().is_some()
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.current_bundle()
            .map(|b| b.is_bootstrapped)
            .unwrap_or(false)
    }

    pub fn model_version(&self) -> Option<String> {
        self.current_bundle().map(|b| b.version())
    }

    fn loaded(&self) -> Result<Arc<ModelBundle>, PredictionError> {
        self.current_bundle().ok_or(PredictionError::ModelsNotLoaded)
    }

    pub fn predict_water_demand(
        &self,
        soil_moisture: f64,
        temperature: f64,
        humidity: f64,
        wind_speed: f64,
        et0: f64,
    ) -> Result<WaterDemandPrediction, PredictionError> {
        let bundle = self.loaded()?;
        let x = [soil_moisture, temperature, humidity, wind_speed, et0];
        ensure_finite(&WATER_FEATURES, &x)?;

        let delta = bundle
            .water
            .predict_row(&x)
            .first()
            .copied()
            .ok_or_else(|| PredictionError::Inference("water model returned no output".into()))?;
        if !delta.is_finite() {
            return Err(PredictionError::Inference("water model output not finite".into()));
        }
        Ok(WaterDemandPrediction::from_loss(soil_moisture, -delta))
    }

    pub fn predict_nutrients(
        &self,
        soil_ph: f64,
        ec_salinity: f64,
        soil_moisture: f64,
    ) -> Result<NpkLevels, PredictionError> {
        let bundle = self.loaded()?;
        let x = [soil_ph, ec_salinity, soil_moisture];
        ensure_finite(&NUTRIENT_FEATURES, &x)?;
        nutrient_prediction(&bundle.nutrient.predict_row(&x))
    }

    pub fn predict_disease_risk(
        &self,
        features: &DiseaseFeatures,
    ) -> Result<DiseasePrediction, PredictionError> {
        let bundle = self.loaded()?;
        let model = bundle
            .disease
            .as_ref()
            .ok_or(PredictionError::DiseaseModelUnavailable)?;
        let x = features.to_array();
        ensure_finite(&DISEASE_FEATURES, &x)?;
        let probability = model.predict_proba(&x);
        if !probability.is_finite() {
            return Err(PredictionError::Inference("disease model output not finite".into()));
        }
        Ok(DiseasePrediction::from_probability(probability))
    }

    /// Validate and buffer a packet; a full buffer triggers a retrain
    pub fn ingest(
        &self,
        packet: &SensorPacket,
        timestamp: i64,
        et0: f64,
        disease: Option<DiseaseFeatures>,
    ) -> Result<IngestOutcome, ValidationError> {
        let validated = match validate_packet(packet) {
            Ok(v) => v,
            Err(e) => {
                self.metrics.inc_packets_rejected();
                self.logger.log_packet_rejected(&e.to_string());
                return Err(e);
            }
        };

        let entry = LearningEntry {
            timestamp,
            packet: validated,
            et0,
            disease,
        };

        let batch = {
            let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            let full = buffer.push(entry);
            self.metrics.set_learning_buffer_items(buffer.len());
            if !full {
                return Ok(IngestOutcome::Buffered { len: buffer.len() });
            }
            let batch = buffer.drain();
            self.metrics.set_learning_buffer_items(0);
            batch
        };

        Ok(self.dispatch_retrain(batch))
    }

    fn dispatch_retrain(&self, entries: Vec<LearningEntry>) -> IngestOutcome {
        let sender = self
            .retrain_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let entries = match sender {
            Some(tx) => match tx.try_send(RetrainRequest { entries }) {
                Ok(()) => {
                    debug!("Retrain batch queued for background worker");
                    return IngestOutcome::RetrainQueued;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Retrain queue full, dropping learning batch");
                    return IngestOutcome::RetrainDropped;
                }
                Err(mpsc::error::TrySendError::Closed(request)) => {
                    debug!("Retrain worker stopped, retraining inline");
                    request.entries
                }
            },
            None => entries,
        };

        match self.retrain_with(entries) {
            Ok(outcome) => IngestOutcome::Retrained(outcome),
            Err(e) => {
                error!(error = %e, "Inline retrain failed");
                IngestOutcome::RetrainFailed(e.to_string())
            }
        }
    }

    /// Fold a drained batch into the dataset, refit and swap if it validates
    pub fn retrain_with(&self, entries: Vec<LearningEntry>) -> Result<RetrainOutcome> {
        let result = self.try_retrain(entries);
        if result.is_err() {
            self.metrics.inc_retrains_rejected();
        }
        result
    }

    fn try_retrain(&self, entries: Vec<LearningEntry>) -> Result<RetrainOutcome> {
        let start = Instant::now();
        let _guard = self.dataset_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let new_rows = label_batch(&entries);
        let added = new_rows.len();

        let mut dataset = self.open_dataset()?;
        dataset.append(new_rows);
        dataset
            .save()
            .with_context(|| format!("Failed to write dataset {:?}", self.config.dataset_path))?;

        let current = self.current_bundle();
        let old_version = current
            .as_ref()
            .map(|b| b.version())
            .unwrap_or_else(|| "none".to_string());
        let generation = current.as_ref().map(|b| b.generation).unwrap_or(0) + 1;

        if let Some(current) = current.as_ref() {
            if let Some((candidate_mae, current_mae)) =
                self.holdout_comparison(dataset.rows(), current)?
            {
                if candidate_mae > current_mae * (1.0 + self.config.max_mae_regression) {
                    self.metrics.inc_retrains_rejected();
                    self.metrics.observe_retrain_latency(start.elapsed().as_secs_f64());
                    self.logger.log_model_retrained(
                        &old_version,
                        &format!("v{}", generation),
                        dataset.len(),
                        false,
                    );
                    return Ok(RetrainOutcome::Rejected {
                        candidate_mae,
                        current_mae,
                    });
                }
            }
        }

        let bundle = ModelBundle::fit(dataset.rows(), &self.config.training, generation, false)
            .context("Failed to refit models")?;
        bundle
            .save(&self.config.model_dir)
            .context("Failed to save model artifacts")?;

        let graduated = current.as_ref().map(|b| b.is_bootstrapped).unwrap_or(false);
        if graduated {
            info!(version = %bundle.version(), "First field retrain completed, models graduated from bootstrap");
        }

        let installed = self.install(bundle);
        self.metrics.inc_retrains_completed();
        self.metrics.observe_retrain_latency(start.elapsed().as_secs_f64());
        self.logger
            .log_model_retrained(&old_version, &installed.version(), dataset.len(), true);

        debug!(added, rows = dataset.len(), "Retrain complete");

        Ok(RetrainOutcome::Swapped {
            version: installed.version(),
            rows: dataset.len(),
            graduated,
        })
    }

    /// Fit a candidate on the older rows and score both bundles on the newest
    /// `holdout_fraction`. `None` when either slice is too small to judge.
    fn holdout_comparison(
        &self,
        rows: &[TrainingRow],
        current: &ModelBundle,
    ) -> Result<Option<(f64, f64)>> {
        let holdout = ((rows.len() as f64) * self.config.holdout_fraction).round() as usize;
        let split = rows.len().saturating_sub(holdout);
        if holdout == 0 || split < MIN_TRAINING_ROWS {
            return Ok(None);
        }
        let (train, test) = rows.split_at(split);

        let candidate = ModelBundle::fit(train, &self.config.training, current.generation + 1, false)
            .context("Failed to fit validation candidate")?;
        let candidate_mae = candidate.water_mae_on(test);
        let current_mae = current.water_mae_on(test);
        debug!(candidate_mae, current_mae, holdout, "Holdout validation");
        Ok(Some((candidate_mae, current_mae)))
    }

    /// Start the background retrain worker; later full buffers are handed to it
    pub fn spawn_worker(
        self: &Arc<Self>,
        health: Option<HealthRegistry>,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let (tx, rx) = mpsc::channel(self.config.retrain_queue_size.max(1));
        *self.retrain_tx.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        let worker = RetrainWorker::new(Arc::clone(self), rx, health);
        tokio::spawn(worker.run(shutdown))
    }

    /// Detach the worker; its loop ends once queued batches drain
    pub fn stop_worker(&self) {
        self.retrain_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn has_worker(&self) -> bool {
        self.retrain_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn buffer_stats(&self) -> LearningBufferStats {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }

    /// Rows in the training dataset; an error means the file exists but is unreadable
    pub fn check_dataset(&self) -> Result<usize, DatasetError> {
        let _guard = self.dataset_lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(TrainingDataset::open(&self.config.dataset_path)?.len())
    }

    /// Active bundle for health reporting
    pub fn model_summary(&self) -> Option<ModelSummary> {
        self.current_bundle().map(|b| ModelSummary {
            version: b.version(),
            is_bootstrapped: b.is_bootstrapped,
            training_rows: b.training_rows,
        })
    }

    pub fn stats(&self) -> MlStats {
        let bundle = self.current_bundle();
        MlStats {
            models_loaded: bundle.is_some(),
            is_bootstrapped: bundle.as_ref().map(|b| b.is_bootstrapped).unwrap_or(false),
            model_version: bundle.as_ref().map(|b| b.version()),
            training_rows: bundle.as_ref().map(|b| b.training_rows),
            disease_model: bundle.as_ref().map(|b| b.disease.is_some()).unwrap_or(false),
            buffer: self.buffer_stats(),
        }
    }
}
