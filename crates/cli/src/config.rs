//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration file, `~/.config/agro/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub model_dir: Option<PathBuf>,
    pub dataset_path: Option<PathBuf>,
    /// Default crop for physics and analysis commands
    pub crop: Option<String>,
    pub growth_stage: Option<String>,
}

/// Effective settings after command-line overrides
#[derive(Debug, Clone)]
pub struct Settings {
    pub model_dir: PathBuf,
    pub dataset_path: PathBuf,
    pub crop: Option<String>,
    pub growth_stage: Option<String>,
}

impl Config {
    /// Load configuration from file; a missing file yields defaults
    pub fn load() -> Result<Self> {
        let config_path = match Self::config_path() {
            Ok(path) => path,
            Err(_) => return Ok(Self::default()),
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Apply flag/env overrides on top of the file values
    pub fn resolve(self, model_dir: Option<PathBuf>, dataset_path: Option<PathBuf>) -> Settings {
        Settings {
            model_dir: model_dir
                .or(self.model_dir)
                .unwrap_or_else(|| PathBuf::from("models")),
            dataset_path: dataset_path
                .or(self.dataset_path)
                .unwrap_or_else(|| PathBuf::from("data/training_data.csv")),
            crop: self.crop,
            growth_stage: self.growth_stage,
        }
    }

    /// Get the configuration file path; `AGRO_CONFIG` overrides it
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("AGRO_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("agro").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file() {
        let config = Config {
            model_dir: Some(PathBuf::from("/srv/models")),
            dataset_path: Some(PathBuf::from("/srv/data.csv")),
            crop: Some("wheat".to_string()),
            growth_stage: None,
        };
        let settings = config.resolve(Some(PathBuf::from("local-models")), None);
        assert_eq!(settings.model_dir, PathBuf::from("local-models"));
        assert_eq!(settings.dataset_path, PathBuf::from("/srv/data.csv"));
        assert_eq!(settings.crop.as_deref(), Some("wheat"));
    }

    #[test]
    fn test_defaults_without_file() {
        let settings = Config::default().resolve(None, None);
        assert_eq!(settings.model_dir, PathBuf::from("models"));
        assert_eq!(settings.dataset_path, PathBuf::from("data/training_data.csv"));
        assert!(settings.crop.is_none());
    }
}
