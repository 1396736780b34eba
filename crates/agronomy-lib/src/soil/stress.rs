//! Soil Stress Index (SSI)
//!
//! Composite 0-100 score of how far the root zone is from optimal. Each
//! component is normalized to [0, 1] before weighting.

use crate::models::round_to;
use serde::{Deserialize, Serialize};

const MOISTURE_WEIGHT: f64 = 0.4;
const SALINITY_WEIGHT: f64 = 0.3;
const PH_WEIGHT: f64 = 0.2;
const TEMPERATURE_WEIGHT: f64 = 0.1;

const OPTIMAL_MOISTURE: f64 = 50.0;
const OPTIMAL_PH: f64 = 6.5;
/// pH deviation at which the pH component saturates
const PH_SPAN: f64 = 2.5;
/// EC at which the salinity component saturates (dS/m)
const SALINITY_SPAN: f64 = 5.0;
const OPTIMAL_TEMP_MIN: f64 = 15.0;
const OPTIMAL_TEMP_MAX: f64 = 30.0;
/// Degrees outside the optimal band at which the temperature component saturates
const TEMPERATURE_SPAN: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StressLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl StressLevel {
    pub fn from_index(index: f64) -> Self {
        if index > 70.0 {
            StressLevel::Critical
        } else if index > 50.0 {
            StressLevel::High
        } else if index > 30.0 {
            StressLevel::Moderate
        } else {
            StressLevel::Low
        }
    }
}

/// Normalized component values, before weighting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressComponents {
    pub moisture: f64,
    pub salinity: f64,
    pub ph: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilStressIndex {
    pub index: f64,
    pub level: StressLevel,
    pub components: StressComponents,
}

/// Compute the SSI; missing EC or pH contribute no stress
pub fn soil_stress_index(
    moisture: f64,
    ec: Option<f64>,
    ph: Option<f64>,
    temperature: f64,
) -> SoilStressIndex {
    let moisture_stress = ((moisture - OPTIMAL_MOISTURE).abs() / OPTIMAL_MOISTURE).min(1.0);
    let salinity_stress = ec
        .map(|ec| (ec.max(0.0) / SALINITY_SPAN).min(1.0))
        .unwrap_or(0.0);
    let ph_stress = ph
        .map(|ph| ((ph - OPTIMAL_PH).abs() / PH_SPAN).min(1.0))
        .unwrap_or(0.0);

    let temp_deviation = if temperature < OPTIMAL_TEMP_MIN {
        OPTIMAL_TEMP_MIN - temperature
    } else if temperature > OPTIMAL_TEMP_MAX {
        temperature - OPTIMAL_TEMP_MAX
    } else {
        0.0
    };
    let temperature_stress = (temp_deviation / TEMPERATURE_SPAN).min(1.0);

    let weighted = MOISTURE_WEIGHT * moisture_stress
        + SALINITY_WEIGHT * salinity_stress
        + PH_WEIGHT * ph_stress
        + TEMPERATURE_WEIGHT * temperature_stress;
    let index = (weighted * 100.0).clamp(0.0, 100.0);

    SoilStressIndex {
        index: round_to(index, 2),
        level: StressLevel::from_index(index),
        components: StressComponents {
            moisture: round_to(moisture_stress, 3),
            salinity: round_to(salinity_stress, 3),
            ph: round_to(ph_stress, 3),
            temperature: round_to(temperature_stress, 3),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimal_conditions_are_low() {
        let ssi = soil_stress_index(50.0, Some(0.0), Some(6.5), 22.0);
        assert!(ssi.index.abs() < 1e-9);
        assert_eq!(ssi.level, StressLevel::Low);
    }

    #[test]
    fn test_extreme_conditions_saturate() {
        let ssi = soil_stress_index(0.0, Some(5.0), Some(9.0), 40.0);
        assert!((ssi.index - 100.0).abs() < 1e-6);
        assert_eq!(ssi.level, StressLevel::Critical);
    }

    #[test]
    fn test_components_are_capped() {
        let ssi = soil_stress_index(100.0, Some(12.0), Some(2.0), -20.0);
        assert_eq!(ssi.components.salinity, 1.0);
        assert_eq!(ssi.components.ph, 1.0);
        assert_eq!(ssi.components.temperature, 1.0);
        assert!(ssi.index <= 100.0);
    }

    #[test]
    fn test_missing_soil_chemistry_contributes_nothing() {
        let ssi = soil_stress_index(50.0, None, None, 22.0);
        assert_eq!(ssi.index, 0.0);
    }

    #[test]
    fn test_moisture_only_stress() {
        // Bone dry soil alone is worth the 0.4 moisture weight
        let ssi = soil_stress_index(0.0, Some(0.0), Some(6.5), 22.0);
        assert!((ssi.index - 40.0).abs() < 1e-9);
        assert_eq!(ssi.level, StressLevel::Moderate);
    }

    #[test]
    fn test_level_bands() {
        assert_eq!(StressLevel::from_index(30.0), StressLevel::Low);
        assert_eq!(StressLevel::from_index(30.1), StressLevel::Moderate);
        assert_eq!(StressLevel::from_index(50.1), StressLevel::High);
        assert_eq!(StressLevel::from_index(70.1), StressLevel::Critical);
    }
}
