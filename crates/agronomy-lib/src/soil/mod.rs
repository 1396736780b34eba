//! Soil chemistry rules
//!
//! - Nutrient availability soft-sensor with pH lockouts and root-burn override
//! - pH corrective actions
//! - Soil Stress Index

mod lockout;
mod stress;

pub use lockout::{
    assess_nutrient_availability, ph_corrective_action, ActionPriority, LockoutKind,
    NpkLevels, NutrientAssessment, NutrientStatus, PhCorrectiveAction, ACIDIC_LOCKOUT_PH,
    ALKALINE_LOCKOUT_PH, ROOT_BURN_EC, ROOT_BURN_MOISTURE,
};
pub use stress::{soil_stress_index, SoilStressIndex, StressComponents, StressLevel};
