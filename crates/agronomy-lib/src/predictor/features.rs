//! Feature extraction for the soft-sensor models
//!
//! Builds the fixed-order input vectors for the water-demand, nutrient and
//! disease models. Disease features summarize the rolling climate window:
//! mean temperature, trailing leaf-wetness duration and temperature range.

use crate::history::ClimateHistory;
use crate::physics::calculate_leaf_wetness_duration;
use serde::{Deserialize, Serialize};

/// Water-demand model inputs, in column order
pub const WATER_FEATURES: [&str; 5] = [
    "soil_moisture",
    "temperature",
    "humidity",
    "wind_speed",
    "et0",
];

/// Nutrient model inputs, in column order
pub const NUTRIENT_FEATURES: [&str; 3] = ["soil_ph", "ec_salinity", "soil_moisture"];

/// Nutrient model outputs, in column order
pub const NUTRIENT_TARGETS: [&str; 3] = ["available_n", "available_p", "available_k"];

/// Disease model inputs, in column order
pub const DISEASE_FEATURES: [&str; 3] = [
    "mean_temperature_window",
    "humidity_duration_hours",
    "temperature_range",
];

/// Climate summary fed to the disease classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiseaseFeatures {
    pub mean_temperature_window: f64,
    pub humidity_duration_hours: f64,
    pub temperature_range: f64,
}

impl DiseaseFeatures {
    pub fn to_array(&self) -> [f64; 3] {
        [
            self.mean_temperature_window,
            self.humidity_duration_hours,
            self.temperature_range,
        ]
    }
}

/// Extracts model inputs from packets and history
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn water_features(
        &self,
        soil_moisture: f64,
        temperature: f64,
        humidity: f64,
        wind_speed: f64,
        et0: f64,
    ) -> [f64; 5] {
        [soil_moisture, temperature, humidity, wind_speed, et0]
    }

    pub fn nutrient_features(&self, soil_ph: f64, ec_salinity: f64, soil_moisture: f64) -> [f64; 3] {
        [soil_ph, ec_salinity, soil_moisture]
    }

    /// Summarize the climate window; `None` until at least one sample exists
    pub fn disease_features(&self, history: &ClimateHistory) -> Option<DiseaseFeatures> {
        if history.is_empty() {
            return None;
        }
        let temperatures = history.temperatures();
        let humidity = history.humidity_series();

        Some(DiseaseFeatures {
            mean_temperature_window: mean(&temperatures),
            humidity_duration_hours: calculate_leaf_wetness_duration(&humidity) as f64,
            temperature_range: range(&temperatures),
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn range(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    max - min
}
