//! Fitted model bundle and its on-disk artifacts
//!
//! A bundle is the unit that gets swapped on retrain: water-demand and
//! nutrient regressors, an optional disease classifier and the metadata that
//! describes how they were trained. On disk each model is a JSON file and
//! `manifest.json` records SHA256 checksums for all of them:
//!
//! ```text
//! <model_dir>/manifest.json
//! <model_dir>/water_demand.json
//! <model_dir>/nutrient.json
//! <model_dir>/disease.json        (absent when no disease model was fitted)
//! ```
//!
//! Every file is written to a temp path, synced and renamed; the manifest goes
//! last so a crash mid-save leaves the previous manifest in place.

use super::features::DISEASE_FEATURES;
use super::regression::{
    mean_absolute_error, LogisticClassifier, RidgeRegressor, MIN_TRAINING_ROWS,
};
use crate::error::ModelError;
use crate::learning::TrainingRow;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const WATER_MODEL_FILE: &str = "water_demand.json";
pub const NUTRIENT_MODEL_FILE: &str = "nutrient.json";
pub const DISEASE_MODEL_FILE: &str = "disease.json";

/// Hyperparameters shared by the three learners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub degree: u8,
    pub water_lambda: f64,
    pub nutrient_lambda: f64,
    pub disease_lambda: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            degree: 2,
            water_lambda: 1.0,
            nutrient_lambda: 1.0,
            disease_lambda: 1.0,
        }
    }
}

/// In-sample quality figures recorded at fit time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub water_mae: f64,
    pub nutrient_n_mae: f64,
    pub disease_accuracy: Option<f64>,
}

/// Metadata persisted alongside the model files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub generation: u64,
    pub trained_at: i64,
    pub is_bootstrapped: bool,
    pub training_rows: usize,
    pub metrics: TrainingMetrics,
    /// File name to SHA256 hex digest
    pub checksums: BTreeMap<String, String>,
}

/// The active set of soft-sensor models
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBundle {
    pub generation: u64,
    pub trained_at: i64,
    /// Trained only on synthetic rows
    pub is_bootstrapped: bool,
    pub training_rows: usize,
    pub metrics: TrainingMetrics,
    pub water: RidgeRegressor,
    pub nutrient: RidgeRegressor,
    pub disease: Option<LogisticClassifier>,
}

pub(crate) fn water_matrix(rows: &[TrainingRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let x = rows
        .iter()
        .map(|r| vec![r.soil_moisture, r.temperature, r.humidity, r.wind_speed, r.et0])
        .collect();
    let y = rows.iter().map(|r| r.moisture_delta_next_24h).collect();
    (x, y)
}

fn nutrient_matrix(rows: &[TrainingRow]) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let x = rows
        .iter()
        .map(|r| vec![r.soil_ph, r.ec_salinity, r.soil_moisture])
        .collect();
    let y = rows
        .iter()
        .map(|r| vec![r.available_n, r.available_p, r.available_k])
        .collect();
    (x, y)
}

fn disease_matrix(rows: &[TrainingRow]) -> (Vec<Vec<f64>>, Vec<bool>) {
    rows.iter()
        .filter_map(TrainingRow::disease_sample)
        .map(|(x, y)| (x.to_vec(), y))
        .unzip()
}

impl ModelBundle {
    /// Fit all models on `rows`
    ///
    /// The disease classifier is skipped (left `None`) when too few rows carry
    /// disease columns or only one class is present.
    pub fn fit(
        rows: &[TrainingRow],
        params: &TrainingParams,
        generation: u64,
        is_bootstrapped: bool,
    ) -> Result<Self, ModelError> {
        let (wx, wy) = water_matrix(rows);
        let wy_cols: Vec<Vec<f64>> = wy.iter().map(|v| vec![*v]).collect();
        let water = RidgeRegressor::fit(&wx, &wy_cols, params.degree, params.water_lambda)?;

        let (nx, ny) = nutrient_matrix(rows);
        let nutrient = RidgeRegressor::fit(&nx, &ny, params.degree, params.nutrient_lambda)?;

        let (dx, dy) = disease_matrix(rows);
        let has_both_classes = dy.iter().any(|&b| b) && dy.iter().any(|&b| !b);
        let disease = if dx.len() >= MIN_TRAINING_ROWS && has_both_classes {
            Some(LogisticClassifier::fit(
                &dx,
                &dy,
                params.degree,
                params.disease_lambda,
            )?)
        } else {
            warn!(
                rows = dx.len(),
                features = ?DISEASE_FEATURES,
                "Not enough labelled disease rows, disease model unavailable"
            );
            None
        };

        let n_targets: Vec<f64> = ny.iter().map(|r| r[0]).collect();
        let disease_accuracy = disease.as_ref().map(|m| {
            let correct = dx
                .iter()
                .zip(&dy)
                .filter(|(x, y)| (m.predict_proba(x) >= 0.5) == **y)
                .count();
            correct as f64 / dx.len() as f64
        });

        let metrics = TrainingMetrics {
            water_mae: mean_absolute_error(&water, &wx, &wy),
            nutrient_n_mae: mean_absolute_error(&nutrient, &nx, &n_targets),
            disease_accuracy,
        };

        info!(
            generation,
            rows = rows.len(),
            is_bootstrapped,
            water_mae = metrics.water_mae,
            disease_model = disease.is_some(),
            "Model bundle fitted"
        );

        Ok(Self {
            generation,
            trained_at: chrono::Utc::now().timestamp(),
            is_bootstrapped,
            training_rows: rows.len(),
            metrics,
            water,
            nutrient,
            disease,
        })
    }

    pub fn version(&self) -> String {
        format!("v{}", self.generation)
    }

    /// Water-demand MAE of this bundle on `rows`
    pub fn water_mae_on(&self, rows: &[TrainingRow]) -> f64 {
        let (x, y) = water_matrix(rows);
        mean_absolute_error(&self.water, &x, &y)
    }

    /// Persist all artifacts, manifest last
    pub fn save(&self, dir: &Path) -> Result<BundleManifest, ModelError> {
        fs::create_dir_all(dir)?;

        let mut checksums = BTreeMap::new();
        let mut write_model = |name: &str, bytes: Vec<u8>| -> Result<(), ModelError> {
            checksums.insert(name.to_string(), compute_checksum(&bytes));
            write_atomic(&dir.join(name), &bytes)
        };

        write_model(WATER_MODEL_FILE, serde_json::to_vec(&self.water)?)?;
        write_model(NUTRIENT_MODEL_FILE, serde_json::to_vec(&self.nutrient)?)?;
        match &self.disease {
            Some(disease) => write_model(DISEASE_MODEL_FILE, serde_json::to_vec(disease)?)?,
            None => {
                let stale = dir.join(DISEASE_MODEL_FILE);
                if stale.exists() {
                    fs::remove_file(&stale)?;
                }
            }
        }

        let manifest = BundleManifest {
            generation: self.generation,
            trained_at: self.trained_at,
            is_bootstrapped: self.is_bootstrapped,
            training_rows: self.training_rows,
            metrics: self.metrics,
            checksums,
        };
        write_atomic(&dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;

        info!(
            dir = %dir.display(),
            version = %self.version(),
            "Model artifacts saved"
        );
        Ok(manifest)
    }

    /// Load and checksum-verify a saved bundle
    pub fn load(dir: &Path) -> Result<Self, ModelError> {
        let manifest: BundleManifest =
            serde_json::from_slice(&fs::read(dir.join(MANIFEST_FILE))?)?;

        let read_verified = |name: &str| -> Result<Vec<u8>, ModelError> {
            let bytes = fs::read(dir.join(name))?;
            let found = compute_checksum(&bytes);
            let expected = manifest.checksums.get(name).cloned().unwrap_or_default();
            if found != expected {
                return Err(ModelError::ChecksumMismatch {
                    file: name.to_string(),
                    expected,
                    found,
                });
            }
            Ok(bytes)
        };

        let water = serde_json::from_slice(&read_verified(WATER_MODEL_FILE)?)?;
        let nutrient = serde_json::from_slice(&read_verified(NUTRIENT_MODEL_FILE)?)?;
        let disease = if manifest.checksums.contains_key(DISEASE_MODEL_FILE) {
            Some(serde_json::from_slice(&read_verified(DISEASE_MODEL_FILE)?)?)
        } else {
            None
        };

        debug!(
            dir = %dir.display(),
            generation = manifest.generation,
            "Model artifacts verified"
        );

        Ok(Self {
            generation: manifest.generation,
            trained_at: manifest.trained_at,
            is_bootstrapped: manifest.is_bootstrapped,
            training_rows: manifest.training_rows,
            metrics: manifest.metrics,
            water,
            nutrient,
            disease,
        })
    }

    /// Whether a manifest exists in `dir`
    pub fn exists(dir: &Path) -> bool {
        dir.join(MANIFEST_FILE).is_file()
    }
}

/// SHA256 hex digest
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ModelError> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::{BootstrapConfig, SyntheticDataGenerator};
    use tempfile::TempDir;

    fn synthetic(rows: usize) -> Vec<TrainingRow> {
        SyntheticDataGenerator::new(BootstrapConfig {
            rows,
            seed: Some(42),
            end_timestamp: 1_700_000_000,
        })
        .generate()
    }

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"model weights");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, compute_checksum(b"model weights"));
    }

    #[test]
    fn test_fit_produces_all_models() {
        let bundle = ModelBundle::fit(&synthetic(800), &TrainingParams::default(), 1, true).unwrap();
        assert!(bundle.disease.is_some());
        assert_eq!(bundle.version(), "v1");
        assert!(bundle.metrics.water_mae < 1.5);
        assert!(bundle.metrics.disease_accuracy.unwrap() > 0.7);
    }

    #[test]
    fn test_fit_without_disease_columns() {
        let mut rows = synthetic(100);
        for row in rows.iter_mut() {
            row.disease_label = None;
        }
        let bundle = ModelBundle::fit(&rows, &TrainingParams::default(), 1, false).unwrap();
        assert!(bundle.disease.is_none());
        assert!(bundle.metrics.disease_accuracy.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let bundle = ModelBundle::fit(&synthetic(300), &TrainingParams::default(), 3, true).unwrap();
        let manifest = bundle.save(dir.path()).unwrap();
        assert_eq!(manifest.checksums.len(), 3);
        assert!(ModelBundle::exists(dir.path()));

        let loaded = ModelBundle::load(dir.path()).unwrap();
        assert_eq!(loaded.generation, 3);
        assert!(loaded.is_bootstrapped);
        assert_eq!(loaded.training_rows, 300);
        assert!(loaded.disease.is_some());

        use crate::predictor::Model;
        let x = [45.0, 30.0, 40.0, 12.0, 7.0];
        let before = bundle.water.predict_row(&x)[0];
        let after = loaded.water.predict_row(&x)[0];
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn test_tampered_artifact_rejected() {
        let dir = TempDir::new().unwrap();
        let bundle = ModelBundle::fit(&synthetic(300), &TrainingParams::default(), 1, true).unwrap();
        bundle.save(dir.path()).unwrap();

        fs::write(dir.path().join(NUTRIENT_MODEL_FILE), b"{}").unwrap();
        assert!(matches!(
            ModelBundle::load(dir.path()),
            Err(ModelError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_manifest_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(!ModelBundle::exists(dir.path()));
        assert!(matches!(ModelBundle::load(dir.path()), Err(ModelError::Io(_))));
    }
}
