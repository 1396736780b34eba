//! Agent configuration

use agronomy_lib::engine::EngineConfig;
use agronomy_lib::physics::{CropType, GrowthStage};
use agronomy_lib::predictor::MlConfig;
use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Agent configuration, read from `AGRO_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Farm identifier attached to every log line and result
    #[serde(default = "default_farm_id")]
    pub farm_id: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    #[serde(default = "default_crop")]
    pub crop: String,

    #[serde(default = "default_growth_stage")]
    pub growth_stage: String,

    /// Station elevation in metres
    #[serde(default)]
    pub elevation_m: f64,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Validated packets collected before a retrain
    #[serde(default = "default_learning_buffer")]
    pub learning_buffer: usize,

    #[serde(default = "default_bootstrap_rows")]
    pub bootstrap_rows: usize,

    #[serde(default)]
    pub force_retrain: bool,
}

fn default_farm_id() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "default".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("data/training_data.csv")
}

fn default_crop() -> String {
    "other".to_string()
}

fn default_growth_stage() -> String {
    "mid_season".to_string()
}

fn default_history_capacity() -> usize {
    agronomy_lib::history::DEFAULT_HISTORY_CAPACITY
}

fn default_learning_buffer() -> usize {
    agronomy_lib::learning::DEFAULT_LEARNING_CAPACITY
}

fn default_bootstrap_rows() -> usize {
    agronomy_lib::learning::DEFAULT_BOOTSTRAP_ROWS
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            farm_id: default_farm_id(),
            api_port: default_api_port(),
            model_dir: default_model_dir(),
            dataset_path: default_dataset_path(),
            crop: default_crop(),
            growth_stage: default_growth_stage(),
            elevation_m: 0.0,
            history_capacity: default_history_capacity(),
            learning_buffer: default_learning_buffer(),
            bootstrap_rows: default_bootstrap_rows(),
            force_retrain: false,
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGRO").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid AGRO_* configuration, using defaults");
            AgentConfig::default()
        }))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            farm_id: self.farm_id.clone(),
            crop: CropType::from_name(&self.crop),
            growth_stage: GrowthStage::from_name(&self.growth_stage),
            elevation_m: self.elevation_m,
            history_capacity: self.history_capacity,
            ..Default::default()
        }
    }

    pub fn ml_config(&self) -> MlConfig {
        MlConfig {
            model_dir: self.model_dir.clone(),
            dataset_path: self.dataset_path.clone(),
            buffer_capacity: self.learning_buffer,
            bootstrap_rows: self.bootstrap_rows,
            force_retrain: self.force_retrain,
            ..Default::default()
        }
    }
}
