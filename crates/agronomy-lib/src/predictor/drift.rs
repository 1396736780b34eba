//! Drift-aware prediction confidence
//!
//! Compares what a model said against what was later measured (or what the
//! rule-based sensor reports) and discounts the model when the relative error
//! exceeds a per-signal tolerance.

use serde::{Deserialize, Serialize};

/// Lowest confidence ever reported
pub const MIN_CONFIDENCE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Moisture,
    Nutrient,
    Disease,
}

impl SignalKind {
    /// Relative error tolerated before confidence drops
    pub fn drift_threshold(self) -> f64 {
        match self {
            SignalKind::Moisture => 0.3,
            SignalKind::Nutrient => 0.5,
            SignalKind::Disease => 0.2,
        }
    }
}

/// Confidence in `predicted` given the `measured` value, in [0.2, 1.0]
pub fn calculate_drift_confidence(measured: f64, predicted: f64, signal: SignalKind) -> f64 {
    if !measured.is_finite() || !predicted.is_finite() {
        return MIN_CONFIDENCE;
    }
    let scale = measured.abs().max(f64::EPSILON);
    let relative_error = (measured - predicted).abs() / scale;
    if relative_error > signal.drift_threshold() {
        (1.0 - relative_error).max(MIN_CONFIDENCE)
    } else {
        1.0
    }
}
