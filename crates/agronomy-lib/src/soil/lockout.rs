//! Rule-based nutrient availability soft-sensor
//!
//! Estimates what the plant can take up, not what the soil contains. The two
//! pH lockouts and the root-burn override are authoritative: a caller holding
//! an ML estimate must still report the status computed here.

use serde::{Deserialize, Serialize};

/// Below this pH phosphorus is fixed by aluminium/iron
pub const ACIDIC_LOCKOUT_PH: f64 = 5.5;

/// Above this pH phosphorus and micronutrients precipitate
pub const ALKALINE_LOCKOUT_PH: f64 = 7.5;

/// Root burn requires salinity above this EC (dS/m)...
pub const ROOT_BURN_EC: f64 = 2.5;

/// ...while moisture is below this percentage
pub const ROOT_BURN_MOISTURE: f64 = 40.0;

/// Osmotic stress penalty applied under root-burn conditions
const ROOT_BURN_PENALTY: f64 = 0.5;

/// Below this pH liming is recommended
const LIMING_PH: f64 = 5.8;

/// Overall nutrient status reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NutrientStatus {
    Optimal,
    Locked,
    Critical,
}

/// Which pH lockout applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockoutKind {
    Acidic,
    Alkaline,
}

/// Plant-available N/P/K in ppm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NpkLevels {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
}

impl NpkLevels {
    pub fn new(nitrogen: f64, phosphorus: f64, potassium: f64) -> Self {
        Self {
            nitrogen,
            phosphorus,
            potassium,
        }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self {
            nitrogen: self.nitrogen * factor,
            phosphorus: self.phosphorus * factor,
            potassium: self.potassium * factor,
        }
    }
}

/// Output of the rule-based soft-sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientAssessment {
    pub status: NutrientStatus,
    /// Set whenever a pH lockout applies, even if root burn escalated the status
    pub lockout: Option<LockoutKind>,
    pub root_burn_risk: bool,
    pub reasons: Vec<String>,
    pub availability: NpkLevels,
}

impl NutrientAssessment {
    pub fn is_locked(&self) -> bool {
        self.lockout.is_some()
    }

    pub fn primary_reason(&self) -> Option<&str> {
        self.reasons.last().map(String::as_str)
    }
}

/// Map soil chemistry to nutrient availability
pub fn assess_nutrient_availability(ph: f64, ec: f64, moisture: f64) -> NutrientAssessment {
    let mut reasons = Vec::new();

    let (mut status, lockout, mut availability) = if ph < ACIDIC_LOCKOUT_PH {
        reasons.push("pH induced phosphorus fixation (Acidic)".to_string());
        (
            NutrientStatus::Locked,
            Some(LockoutKind::Acidic),
            NpkLevels::new(20.0, 10.0, 15.0),
        )
    } else if ph > ALKALINE_LOCKOUT_PH {
        reasons.push("pH induced phosphorus fixation (Alkaline)".to_string());
        (
            NutrientStatus::Locked,
            Some(LockoutKind::Alkaline),
            NpkLevels::new(80.0, 15.0, 20.0),
        )
    } else {
        let n_factor = (1.0 - 0.15 * (ph - 6.5).abs()).max(0.2);
        let p_factor = (1.0 - 0.20 * (ph - 7.0).abs()).max(0.2);
        (
            NutrientStatus::Optimal,
            None,
            NpkLevels::new(100.0 * n_factor, 80.0 * p_factor, 120.0),
        )
    };

    let root_burn_risk = ec > ROOT_BURN_EC && moisture < ROOT_BURN_MOISTURE;
    if root_burn_risk {
        status = NutrientStatus::Critical;
        reasons.push("Root burn risk".to_string());
        availability = availability.scaled(ROOT_BURN_PENALTY);
    }

    NutrientAssessment {
        status,
        lockout,
        root_burn_risk,
        reasons,
        availability,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    Low,
    Medium,
    High,
}

/// Soil amendment recommendation for the measured pH
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhCorrectiveAction {
    pub condition: String,
    pub action: String,
    pub amendments: Vec<String>,
    pub priority: ActionPriority,
}

pub fn ph_corrective_action(ph: f64) -> PhCorrectiveAction {
    if ph > ALKALINE_LOCKOUT_PH {
        PhCorrectiveAction {
            condition: "alkaline".to_string(),
            action: "Acidify root zone and supply chelated micronutrients".to_string(),
            amendments: vec![
                "ammonium sulfate".to_string(),
                "elemental sulfur".to_string(),
                "chelated iron".to_string(),
            ],
            priority: ActionPriority::Medium,
        }
    } else if ph < LIMING_PH {
        PhCorrectiveAction {
            condition: "acidic".to_string(),
            action: "Raise pH by liming".to_string(),
            amendments: vec!["agricultural lime".to_string(), "dolomite".to_string()],
            priority: ActionPriority::High,
        }
    } else {
        PhCorrectiveAction {
            condition: "optimal".to_string(),
            action: "No pH correction required".to_string(),
            amendments: Vec::new(),
            priority: ActionPriority::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_acidic_lockout() {
        let a = assess_nutrient_availability(4.9, 1.0, 60.0);
        assert_eq!(a.status, NutrientStatus::Locked);
        assert_eq!(a.lockout, Some(LockoutKind::Acidic));
        assert!(a.primary_reason().unwrap().contains("Acidic"));
        assert_eq!(a.availability, NpkLevels::new(20.0, 10.0, 15.0));
    }

    #[test]
    fn test_alkaline_lockout() {
        let a = assess_nutrient_availability(8.2, 1.0, 60.0);
        assert_eq!(a.status, NutrientStatus::Locked);
        assert_eq!(a.lockout, Some(LockoutKind::Alkaline));
        assert!(a.primary_reason().unwrap().contains("Alkaline"));
        assert_eq!(a.availability, NpkLevels::new(80.0, 15.0, 20.0));
    }

    #[test]
    fn test_lockout_boundaries_inclusive_of_normal_range() {
        assert_eq!(assess_nutrient_availability(5.5, 1.0, 60.0).status, NutrientStatus::Optimal);
        assert_eq!(assess_nutrient_availability(7.5, 1.0, 60.0).status, NutrientStatus::Optimal);
    }

    #[test]
    fn test_normal_branch_values() {
        let a = assess_nutrient_availability(6.5, 1.0, 60.0);
        assert_eq!(a.status, NutrientStatus::Optimal);
        assert!(a.reasons.is_empty());
        assert_relative_eq!(a.availability.nitrogen, 100.0);
        assert_relative_eq!(a.availability.phosphorus, 72.0);
        assert_relative_eq!(a.availability.potassium, 120.0);
    }

    #[test]
    fn test_root_burn_halves_normal_branch() {
        let base = assess_nutrient_availability(6.5, 1.0, 60.0).availability;
        let burned = assess_nutrient_availability(6.5, 3.0, 20.0);
        assert_eq!(burned.status, NutrientStatus::Critical);
        assert!(burned.root_burn_risk);
        assert_eq!(burned.primary_reason(), Some("Root burn risk"));
        assert_relative_eq!(burned.availability.nitrogen, base.nitrogen * 0.5);
        assert_relative_eq!(burned.availability.phosphorus, base.phosphorus * 0.5);
        assert_relative_eq!(burned.availability.potassium, base.potassium * 0.5);
    }

    #[test]
    fn test_root_burn_keeps_lockout_flag() {
        let a = assess_nutrient_availability(4.9, 3.0, 20.0);
        assert_eq!(a.status, NutrientStatus::Critical);
        assert_eq!(a.lockout, Some(LockoutKind::Acidic));
        assert!(a.is_locked());
        assert_eq!(a.reasons.len(), 2);
        assert_relative_eq!(a.availability.nitrogen, 10.0);
    }

    #[test]
    fn test_root_burn_needs_both_conditions() {
        assert!(!assess_nutrient_availability(6.5, 3.0, 40.0).root_burn_risk);
        assert!(!assess_nutrient_availability(6.5, 2.5, 20.0).root_burn_risk);
    }

    #[test]
    fn test_corrective_actions() {
        let alkaline = ph_corrective_action(8.0);
        assert_eq!(alkaline.priority, ActionPriority::Medium);
        assert!(alkaline.amendments.iter().any(|a| a.contains("sulfur")));

        let acidic = ph_corrective_action(5.6);
        assert_eq!(acidic.priority, ActionPriority::High);
        assert!(acidic.amendments.iter().any(|a| a.contains("lime")));

        assert_eq!(ph_corrective_action(6.5).priority, ActionPriority::Low);
        assert_eq!(ph_corrective_action(7.5).priority, ActionPriority::Low);
    }
}
