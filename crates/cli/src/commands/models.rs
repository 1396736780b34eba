//! Model lifecycle commands

use anyhow::{Context, Result};
use agronomy_lib::learning::TrainingDataset;
use agronomy_lib::predictor::{MlConfig, MlManager, ModelBundle, TrainingMetrics};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::Settings;
use crate::output::{
    format_confidence, format_timestamp, print_heading, print_info, print_json, print_rows,
    print_success, print_warning, FieldRow, OutputFormat,
};

#[derive(Debug, Serialize)]
pub struct BundleInfo {
    pub model_dir: PathBuf,
    pub version: String,
    pub generation: u64,
    pub trained_at: i64,
    pub is_bootstrapped: bool,
    pub training_rows: usize,
    pub metrics: TrainingMetrics,
    pub disease_model: bool,
    pub dataset_path: PathBuf,
    pub dataset_rows: usize,
}

impl BundleInfo {
    fn new(bundle: &ModelBundle, settings: &Settings, dataset_rows: usize) -> Self {
        Self {
            model_dir: settings.model_dir.clone(),
            version: bundle.version(),
            generation: bundle.generation,
            trained_at: bundle.trained_at,
            is_bootstrapped: bundle.is_bootstrapped,
            training_rows: bundle.training_rows,
            metrics: bundle.metrics,
            disease_model: bundle.disease.is_some(),
            dataset_path: settings.dataset_path.clone(),
            dataset_rows,
        }
    }
}

fn manager(settings: &Settings, rows: Option<usize>, seed: Option<u64>) -> MlManager {
    let mut config = MlConfig {
        model_dir: settings.model_dir.clone(),
        dataset_path: settings.dataset_path.clone(),
        ..Default::default()
    };
    if let Some(rows) = rows {
        config.bootstrap_rows = rows;
    }
    config.bootstrap_seed = seed;
    MlManager::new(config)
}

fn dataset_rows(settings: &Settings) -> Result<usize> {
    let dataset = TrainingDataset::open(&settings.dataset_path)
        .with_context(|| format!("Failed to read dataset {:?}", settings.dataset_path))?;
    Ok(dataset.len())
}

fn show(info: &BundleInfo, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(info);
    }

    let origin = if info.is_bootstrapped {
        "bootstrap (synthetic)".yellow().to_string()
    } else {
        "field data".green().to_string()
    };
    let rows = vec![
        FieldRow::new("Version", info.version.cyan()),
        FieldRow::new("Trained", format_timestamp(info.trained_at)),
        FieldRow::new("Origin", origin),
        FieldRow::new("Training rows", info.training_rows),
        FieldRow::new("Water MAE", format!("{:.3} %/h", info.metrics.water_mae)),
        FieldRow::new("Nitrogen MAE", format!("{:.1} ppm", info.metrics.nutrient_n_mae)),
        FieldRow::new(
            "Disease model",
            match info.metrics.disease_accuracy {
                Some(accuracy) => format!("accuracy {}", format_confidence(accuracy)),
                None if info.disease_model => "loaded".to_string(),
                None => "unavailable".dimmed().to_string(),
            },
        ),
        FieldRow::new("Model dir", info.model_dir.display()),
        FieldRow::new(
            "Dataset",
            format!("{} ({} rows)", info.dataset_path.display(), info.dataset_rows),
        ),
    ];

    print_heading("Model Bundle");
    print_rows(rows);
    Ok(())
}

pub fn bootstrap(settings: &Settings, force: bool, rows: usize, seed: u64, format: OutputFormat) -> Result<()> {
    if ModelBundle::exists(&settings.model_dir) && !force {
        print_warning(&format!(
            "Models already exist in {}; pass --force to replace them",
            settings.model_dir.display()
        ));
        return Ok(());
    }

    let manager = manager(settings, Some(rows), Some(seed));
    let bundle = manager.bootstrap().context("Bootstrap failed")?;
    let info = BundleInfo::new(&bundle, settings, dataset_rows(settings)?);

    if format == OutputFormat::Table {
        print_success(&format!(
            "Bootstrapped {} from {} synthetic rows",
            info.version, info.training_rows
        ));
    }
    show(&info, format)
}

pub fn train(settings: &Settings, format: OutputFormat) -> Result<()> {
    let manager = manager(settings, None, None);
    let bundle = manager.train_from_dataset().context("Training failed")?;
    let info = BundleInfo::new(&bundle, settings, dataset_rows(settings)?);

    if format == OutputFormat::Table {
        print_success(&format!(
            "Trained {} on {} rows",
            info.version, info.training_rows
        ));
    }
    show(&info, format)
}

pub fn info(settings: &Settings, format: OutputFormat) -> Result<()> {
    if !ModelBundle::exists(&settings.model_dir) {
        match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "model_dir": settings.model_dir,
                "models_loaded": false,
            }))?,
            OutputFormat::Table => {
                print_warning(&format!("No models in {}", settings.model_dir.display()));
                print_info("Run 'agro models bootstrap' to create a starter bundle");
            }
        }
        return Ok(());
    }

    let bundle = ModelBundle::load(&settings.model_dir)
        .with_context(|| format!("Failed to load models from {:?}", settings.model_dir))?;
    show(&BundleInfo::new(&bundle, settings, dataset_rows(settings)?), format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> Settings {
        Settings {
            model_dir: dir.path().join("models"),
            dataset_path: dir.path().join("dataset.csv"),
            crop: None,
            growth_stage: None,
        }
    }

    #[test]
    fn test_bootstrap_then_train_increments_generation() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);

        bootstrap(&settings, false, 300, 7, OutputFormat::Json).unwrap();
        let first = ModelBundle::load(&settings.model_dir).unwrap();
        assert_eq!(first.generation, 1);
        assert!(first.is_bootstrapped);
        assert_eq!(dataset_rows(&settings).unwrap(), 300);

        train(&settings, OutputFormat::Json).unwrap();
        let second = ModelBundle::load(&settings.model_dir).unwrap();
        assert_eq!(second.generation, 2);
        assert!(second.is_bootstrapped);
    }

    #[test]
    fn test_bootstrap_without_force_keeps_models() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);

        bootstrap(&settings, false, 300, 7, OutputFormat::Json).unwrap();
        bootstrap(&settings, false, 300, 7, OutputFormat::Json).unwrap();
        assert_eq!(ModelBundle::load(&settings.model_dir).unwrap().generation, 1);

        bootstrap(&settings, true, 300, 7, OutputFormat::Json).unwrap();
        assert_eq!(ModelBundle::load(&settings.model_dir).unwrap().generation, 2);
    }

    #[test]
    fn test_train_requires_dataset() {
        let dir = TempDir::new().unwrap();
        assert!(train(&settings(&dir), OutputFormat::Json).is_err());
    }

    #[test]
    fn test_info_without_models() {
        let dir = TempDir::new().unwrap();
        assert!(info(&settings(&dir), OutputFormat::Json).is_ok());
    }
}
