//! Prediction outputs and post-processing
//!
//! Raw model outputs are turned into agronomic quantities here: a 24 h loss
//! becomes a future moisture, an irrigation event and hours to the critical
//! threshold; a class probability becomes a risk label.

use crate::error::PredictionError;
use crate::models::round_to;
use crate::soil::NpkLevels;
use serde::{Deserialize, Serialize};

/// Soil moisture (%) below which the crop is water-stressed
pub const CRITICAL_MOISTURE: f64 = 30.0;

/// Reported when no loss is predicted
pub const NO_CRITICAL_SENTINEL_HOURS: f64 = 999.0;

/// Disease probability above which the risk is HIGH
pub const DISEASE_RISK_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaterEvent {
    PreemptiveIrrigation,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterDemandPrediction {
    /// Moisture points expected to be lost over 24 h
    pub predicted_loss_24h: f64,
    pub future_moisture: f64,
    pub event: WaterEvent,
    pub time_to_critical_hours: f64,
}

impl WaterDemandPrediction {
    /// Project `current_moisture` forward by a predicted 24 h loss
    pub fn from_loss(current_moisture: f64, loss_24h: f64) -> Self {
        let future_moisture = (current_moisture - loss_24h).clamp(0.0, 100.0);
        let event = if future_moisture < CRITICAL_MOISTURE {
            WaterEvent::PreemptiveIrrigation
        } else {
            WaterEvent::Normal
        };
        let time_to_critical_hours = if loss_24h <= 0.0 {
            NO_CRITICAL_SENTINEL_HOURS
        } else {
            ((current_moisture - CRITICAL_MOISTURE) / (loss_24h / 24.0)).max(0.0)
        };

        Self {
            predicted_loss_24h: round_to(loss_24h, 2),
            future_moisture: round_to(future_moisture, 1),
            event,
            time_to_critical_hours: round_to(time_to_critical_hours, 1),
        }
    }

    pub fn needs_irrigation(&self) -> bool {
        self.event == WaterEvent::PreemptiveIrrigation
    }

    /// Loss rate in moisture points per hour
    pub fn hourly_loss(&self) -> f64 {
        self.predicted_loss_24h / 24.0
    }
}

/// Round raw nutrient outputs to whole-tenth ppm, never negative
pub fn nutrient_prediction(raw: &[f64]) -> Result<NpkLevels, PredictionError> {
    match raw {
        [n, p, k, ..] => Ok(NpkLevels::new(
            round_to(n.max(0.0), 1),
            round_to(p.max(0.0), 1),
            round_to(k.max(0.0), 1),
        )),
        _ => Err(PredictionError::Inference(format!(
            "nutrient model returned {} outputs, expected 3",
            raw.len()
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiseaseRisk {
    HighRisk,
    LowRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiseasePrediction {
    pub probability: f64,
    pub risk: DiseaseRisk,
}

impl DiseasePrediction {
    pub fn from_probability(probability: f64) -> Self {
        let risk = if probability > DISEASE_RISK_THRESHOLD {
            DiseaseRisk::HighRisk
        } else {
            DiseaseRisk::LowRisk
        };
        Self {
            probability: round_to(probability, 3),
            risk,
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.risk == DiseaseRisk::HighRisk
    }
}

/// Reject NaN/inf inputs before they reach a model
pub(crate) fn ensure_finite(names: &[&'static str], values: &[f64]) -> Result<(), PredictionError> {
    for (name, value) in names.iter().zip(values) {
        if !value.is_finite() {
            return Err(PredictionError::NonFiniteInput(name));
        }
    }
    Ok(())
}
