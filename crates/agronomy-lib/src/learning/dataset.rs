//! CSV-backed training dataset
//!
//! One row per labelled observation. The disease columns stay empty for rows
//! recorded before the climate window had any samples. Saves go through a temp
//! file and rename so a crash mid-write never leaves a truncated dataset.

use crate::error::DatasetError;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Oldest rows are dropped beyond this count
pub const MAX_DATASET_ROWS: usize = 10_000;

/// A labelled observation, in CSV column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub timestamp: i64,
    pub soil_moisture: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub ec_salinity: f64,
    pub soil_ph: f64,
    pub et0: f64,
    pub moisture_delta_next_24h: f64,
    pub available_n: f64,
    pub available_p: f64,
    pub available_k: f64,
    #[serde(default)]
    pub mean_temperature_window: Option<f64>,
    #[serde(default)]
    pub humidity_duration_hours: Option<f64>,
    #[serde(default)]
    pub temperature_range: Option<f64>,
    #[serde(default)]
    pub disease_label: Option<u8>,
}

impl TrainingRow {
    /// Disease features and label, when all four columns are present
    pub fn disease_sample(&self) -> Option<([f64; 3], bool)> {
        Some((
            [
                self.mean_temperature_window?,
                self.humidity_duration_hours?,
                self.temperature_range?,
            ],
            self.disease_label? != 0,
        ))
    }
}

/// Bounded, persistent collection of training rows
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    path: PathBuf,
    rows: Vec<TrainingRow>,
    max_rows: usize,
}

impl TrainingDataset {
    /// Empty dataset bound to `path`; nothing is written until [`save`](Self::save)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Vec::new(),
            max_rows: MAX_DATASET_ROWS,
        }
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows.max(1);
        self.truncate_front();
        self
    }

    /// Read an existing CSV file
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        let path = path.into();
        let mut reader = csv::Reader::from_path(&path)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<TrainingRow>, csv::Error>>()?;

        info!(path = %path.display(), rows = rows.len(), "Loaded training dataset");

        let mut dataset = Self {
            path,
            rows,
            max_rows: MAX_DATASET_ROWS,
        };
        dataset.truncate_front();
        Ok(dataset)
    }

    /// Load when the file exists, otherwise start empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        let path = path.into();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new(path))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[TrainingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// Append rows, dropping the oldest past the cap. Returns how many were dropped.
    pub fn append(&mut self, rows: impl IntoIterator<Item = TrainingRow>) -> usize {
        self.rows.extend(rows);
        self.truncate_front()
    }

    fn truncate_front(&mut self) -> usize {
        let excess = self.rows.len().saturating_sub(self.max_rows);
        if excess > 0 {
            self.rows.drain(..excess);
            debug!(dropped = excess, "Dataset cap reached, dropped oldest rows");
        }
        excess
    }

    /// Write the dataset atomically
    pub fn save(&self) -> Result<(), DatasetError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in &self.rows {
            writer.serialize(row)?;
        }
        let data = writer
            .into_inner()
            .map_err(|e| DatasetError::Io(e.into_error()))?;

        let temp_path = self.path.with_extension("csv.tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), rows = self.rows.len(), "Training dataset saved");
        Ok(())
    }

    /// Whether the file on disk exists and holds at least one row
    pub fn exists_on_disk(path: &Path) -> bool {
        File::open(path)
            .ok()
            .map(|f| {
                let mut reader = csv::Reader::from_reader(f);
                reader.records().next().is_some()
            })
            .unwrap_or(false)
    }

    pub fn ensure_not_empty(&self) -> Result<(), DatasetError> {
        if self.rows.is_empty() {
            Err(DatasetError::Empty)
        } else {
            Ok(())
        }
    }
}
