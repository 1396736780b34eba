//! Physical agronomy models
//!
//! Stateless calculators used by the decision engine:
//! - FAO-56 Penman-Monteith reference evapotranspiration
//! - Crop coefficients and crop evapotranspiration
//! - Leaching requirement and salinity stress
//! - Wind safety for spray and fertilizer application
//! - Leaf wetness duration from humidity history
//!
//! Every function is total over its numeric domain; denominators are guarded
//! with fixed fallbacks instead of returning errors.

mod crop;
mod evapotranspiration;
mod salinity;
mod wetness;
mod wind;

pub use crop::{crop_coefficient, crop_evapotranspiration, CropType, GrowthStage};
pub use evapotranspiration::{
    atmospheric_pressure, calculate_et0, calculate_et0_at, psychrometric_constant,
    saturation_vapor_pressure, slope_vapor_pressure_curve, water_demand_level, WaterDemandLevel,
    NET_RADIATION_MJ_M2_DAY,
};
pub use salinity::{
    assess_salinity_stress, calculate_leaching_requirement, SalinityAction, SalinityStress,
    IRRIGATION_WATER_EC, MAX_LEACHING_REQUIREMENT,
};
pub use wetness::{calculate_leaf_wetness_duration, WET_HUMIDITY_THRESHOLD};
pub use wind::{check_wind_safety, WindRisk, WindSafety, WIND_SAFETY_THRESHOLD_KMH};
