//! FAO-56 Penman-Monteith reference evapotranspiration
//!
//! Uses a constant net radiation and zero soil heat flux, which is the
//! simplification field stations without a pyranometer run with.

use serde::{Deserialize, Serialize};

/// Simplified daily net radiation at the crop surface (MJ/m²/day)
pub const NET_RADIATION_MJ_M2_DAY: f64 = 15.0;

/// Soil heat flux density, negligible at a daily step (MJ/m²/day)
const SOIL_HEAT_FLUX: f64 = 0.0;

/// ET0 above which atmospheric water demand is high (mm/day)
const HIGH_DEMAND_ET0: f64 = 6.0;

/// ET0 above which atmospheric water demand is moderate (mm/day)
const MODERATE_DEMAND_ET0: f64 = 4.0;

/// Atmospheric pressure (kPa) from elevation using the standard barometric formula
pub fn atmospheric_pressure(elevation_m: f64) -> f64 {
    101.3 * ((293.0 - 0.0065 * elevation_m) / 293.0).powf(5.26)
}

/// Psychrometric constant γ (kPa/°C)
pub fn psychrometric_constant(elevation_m: f64) -> f64 {
    0.000665 * atmospheric_pressure(elevation_m)
}

/// Saturation vapour pressure es (kPa) at air temperature (°C)
pub fn saturation_vapor_pressure(temperature: f64) -> f64 {
    0.6108 * ((17.27 * temperature) / (temperature + 237.3)).exp()
}

/// Slope of the saturation vapour pressure curve Δ (kPa/°C)
pub fn slope_vapor_pressure_curve(temperature: f64) -> f64 {
    let es = saturation_vapor_pressure(temperature);
    4098.0 * es / (temperature + 237.3).powi(2)
}

/// Reference evapotranspiration at sea level (mm/day)
///
/// # Arguments
/// * `temperature` - Mean air temperature, °C
/// * `humidity` - Relative humidity, percent
/// * `wind_speed_kmh` - Wind speed at 2 m, km/h
pub fn calculate_et0(temperature: f64, humidity: f64, wind_speed_kmh: f64) -> f64 {
    calculate_et0_at(temperature, humidity, wind_speed_kmh, 0.0)
}

/// Reference evapotranspiration at a given elevation (mm/day), never negative
pub fn calculate_et0_at(
    temperature: f64,
    humidity: f64,
    wind_speed_kmh: f64,
    elevation_m: f64,
) -> f64 {
    let u2 = wind_speed_kmh / 3.6;
    let es = saturation_vapor_pressure(temperature);
    let ea = es * (humidity / 100.0);
    let delta = slope_vapor_pressure_curve(temperature);
    let gamma = psychrometric_constant(elevation_m);

    let radiation_term = 0.408 * delta * (NET_RADIATION_MJ_M2_DAY - SOIL_HEAT_FLUX);
    let aerodynamic_term = gamma * (900.0 / (temperature + 273.0)) * u2 * (es - ea);
    let denominator = delta + gamma * (1.0 + 0.34 * u2);

    if denominator <= 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    let et0 = (radiation_term + aerodynamic_term) / denominator;
    if et0.is_finite() {
        et0.max(0.0)
    } else {
        0.0
    }
}

/// Atmospheric water demand band derived from ET0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterDemandLevel {
    Low,
    Moderate,
    High,
}

pub fn water_demand_level(et0: f64) -> WaterDemandLevel {
    if et0 > HIGH_DEMAND_ET0 {
        WaterDemandLevel::High
    } else if et0 > MODERATE_DEMAND_ET0 {
        WaterDemandLevel::Moderate
    } else {
        WaterDemandLevel::Low
    }
}
