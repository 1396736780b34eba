//! Wind drift safety for spray and fertilizer application

use crate::models::{Operation, WIND_BLOCKED_OPERATIONS};
use serde::{Deserialize, Serialize};

/// Wind speed above which application is unsafe (km/h)
pub const WIND_SAFETY_THRESHOLD_KMH: f64 = 20.0;

const MODERATE_WIND_KMH: f64 = 15.0;
const EXTREME_WIND_KMH: f64 = 30.0;

/// Drift risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindRisk {
    Low,
    Moderate,
    High,
    Extreme,
}

/// Result of a wind safety check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindSafety {
    pub wind_speed_kmh: f64,
    pub risk_level: WindRisk,
    pub is_safe_for_spraying: bool,
    pub blocked_operations: Vec<Operation>,
}

pub fn check_wind_safety(wind_speed_kmh: f64) -> WindSafety {
    let risk_level = if wind_speed_kmh < MODERATE_WIND_KMH {
        WindRisk::Low
    } else if wind_speed_kmh <= WIND_SAFETY_THRESHOLD_KMH {
        WindRisk::Moderate
    } else if wind_speed_kmh <= EXTREME_WIND_KMH {
        WindRisk::High
    } else {
        WindRisk::Extreme
    };

    let is_safe_for_spraying = wind_speed_kmh <= WIND_SAFETY_THRESHOLD_KMH;
    let blocked_operations = if is_safe_for_spraying {
        Vec::new()
    } else {
        WIND_BLOCKED_OPERATIONS.to_vec()
    };

    WindSafety {
        wind_speed_kmh,
        risk_level,
        is_safe_for_spraying,
        blocked_operations,
    }
}
