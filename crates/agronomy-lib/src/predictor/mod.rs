//! Soft-sensor models and their lifecycle
//!
//! - Feature extraction for the water, nutrient and disease models
//! - Ridge / logistic learners and the persisted model bundle
//! - Prediction post-processing and drift-aware confidence
//! - `MlManager`: bootstrap, inference, buffering and retraining
//! - Background retrain worker

mod bundle;
mod drift;
mod features;
mod inference;
mod manager;
mod regression;
mod worker;

#[cfg(test)]
mod tests;

pub use bundle::{
    compute_checksum, BundleManifest, ModelBundle, TrainingMetrics, TrainingParams,
    DISEASE_MODEL_FILE, MANIFEST_FILE, NUTRIENT_MODEL_FILE, WATER_MODEL_FILE,
};
pub use drift::{calculate_drift_confidence, SignalKind, MIN_CONFIDENCE};
pub use features::{
    DiseaseFeatures, FeatureExtractor, DISEASE_FEATURES, NUTRIENT_FEATURES, NUTRIENT_TARGETS,
    WATER_FEATURES,
};
pub use inference::{
    DiseasePrediction, DiseaseRisk, WaterDemandPrediction, WaterEvent, CRITICAL_MOISTURE,
    DISEASE_RISK_THRESHOLD, NO_CRITICAL_SENTINEL_HOURS,
};
pub use manager::{IngestOutcome, InitOutcome, MlConfig, MlManager, MlStats, RetrainOutcome};
pub use regression::{
    mean_absolute_error, LogisticClassifier, Model, RidgeRegressor, Standardizer,
    MIN_TRAINING_ROWS,
};
pub use worker::{RetrainRequest, RetrainWorker};
