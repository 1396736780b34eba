//! Leaching requirement and crop salinity stress

use super::crop::CropType;
use serde::{Deserialize, Serialize};

/// EC of the irrigation water assumed by salinity assessment (dS/m)
pub const IRRIGATION_WATER_EC: f64 = 0.5;

/// Leaching fraction ceiling, also the fallback for degenerate inputs
pub const MAX_LEACHING_REQUIREMENT: f64 = 0.5;

const FLUSH_CYCLE_LR: f64 = 0.20;
const INCREASE_IRRIGATION_LR: f64 = 0.10;

/// Leaching requirement LR = ECw / (5·ECe − ECw), in [0, 0.5]
pub fn calculate_leaching_requirement(ec_irrigation_water: f64, ec_soil: f64) -> f64 {
    let denominator = 5.0 * ec_soil - ec_irrigation_water;
    if denominator <= 0.0 || !denominator.is_finite() {
        return MAX_LEACHING_REQUIREMENT;
    }
    let lr = ec_irrigation_water / denominator;
    if lr.is_finite() {
        lr.clamp(0.0, MAX_LEACHING_REQUIREMENT)
    } else {
        MAX_LEACHING_REQUIREMENT
    }
}

/// Recommended response to soil salinity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalinityAction {
    Normal,
    Monitor,
    IncreaseIrrigation,
    FlushCycle,
}

/// Salinity assessment for one crop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalinityStress {
    pub crop: CropType,
    pub ec_soil: f64,
    pub threshold: f64,
    pub is_stressed: bool,
    /// Present only when the soil is above the crop threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaching_requirement: Option<f64>,
    pub action: SalinityAction,
}

pub fn assess_salinity_stress(ec_soil: f64, crop: CropType) -> SalinityStress {
    let threshold = crop.salinity_threshold();
    if ec_soil <= threshold {
        return SalinityStress {
            crop,
            ec_soil,
            threshold,
            is_stressed: false,
            leaching_requirement: None,
            action: SalinityAction::Normal,
        };
    }

    let lr = calculate_leaching_requirement(IRRIGATION_WATER_EC, ec_soil);
    let action = if lr > FLUSH_CYCLE_LR {
        SalinityAction::FlushCycle
    } else if lr > INCREASE_IRRIGATION_LR {
        SalinityAction::IncreaseIrrigation
    } else {
        SalinityAction::Monitor
    };

    SalinityStress {
        crop,
        ec_soil,
        threshold,
        is_stressed: true,
        leaching_requirement: Some(lr),
        action,
    }
}
