//! Stateless physics and soil chemistry commands

use anyhow::Result;
use agronomy_lib::physics::{
    assess_salinity_stress, calculate_et0_at, check_wind_safety, crop_coefficient,
    crop_evapotranspiration, water_demand_level, CropType, GrowthStage, SalinityStress,
    WaterDemandLevel, WindSafety,
};
use agronomy_lib::soil::{
    assess_nutrient_availability, ph_corrective_action, soil_stress_index, NutrientAssessment,
    PhCorrectiveAction, SoilStressIndex,
};
use agronomy_lib::models::round_to;
use serde::Serialize;

use super::label;
use crate::output::{color_index, color_status, print_heading, print_json, print_rows, FieldRow, OutputFormat};

#[derive(Debug, Serialize)]
pub struct Et0Report {
    pub et0: f64,
    pub etc: f64,
    pub crop: CropType,
    pub growth_stage: GrowthStage,
    pub crop_coefficient: f64,
    pub water_demand: WaterDemandLevel,
    pub wind: WindSafety,
}

pub fn et0_report(
    temperature: f64,
    humidity: f64,
    wind: f64,
    elevation: f64,
    crop: Option<String>,
    stage: Option<String>,
) -> Et0Report {
    let crop = crop.map(|c| CropType::from_name(&c)).unwrap_or_default();
    let growth_stage = stage.map(|s| GrowthStage::from_name(&s)).unwrap_or_default();
    let et0 = calculate_et0_at(temperature, humidity, wind, elevation);
    let kc = crop_coefficient(crop, growth_stage);

    Et0Report {
        et0: round_to(et0, 2),
        etc: round_to(crop_evapotranspiration(et0, kc), 2),
        crop,
        growth_stage,
        crop_coefficient: kc,
        water_demand: water_demand_level(et0),
        wind: check_wind_safety(wind),
    }
}

pub fn show_et0(
    temperature: f64,
    humidity: f64,
    wind: f64,
    elevation: f64,
    crop: Option<String>,
    stage: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let report = et0_report(temperature, humidity, wind, elevation, crop, stage);

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_heading("Evapotranspiration");
            let blocked: Vec<String> = report.wind.blocked_operations.iter().map(label).collect();
            print_rows(vec![
                FieldRow::new("ET0 (mm/day)", format!("{:.2}", report.et0)),
                FieldRow::new(
                    &format!("ETc {} (Kc {:.2})", report.crop, report.crop_coefficient),
                    format!("{:.2}", report.etc),
                ),
                FieldRow::new("Water demand", color_status(&label(&report.water_demand))),
                FieldRow::new("Wind risk", color_status(&label(&report.wind.risk_level))),
                FieldRow::new(
                    "Spraying",
                    if report.wind.is_safe_for_spraying {
                        color_status("safe")
                    } else {
                        color_status("blocked")
                    },
                ),
                FieldRow::new(
                    "Blocked operations",
                    if blocked.is_empty() { "-".to_string() } else { blocked.join(", ") },
                ),
            ]);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SoilReport {
    pub nutrients: NutrientAssessment,
    pub corrective_action: PhCorrectiveAction,
    pub salinity: SalinityStress,
    pub stress: SoilStressIndex,
}

pub fn soil_report(ph: f64, ec: f64, moisture: f64, temperature: f64, crop: Option<String>) -> SoilReport {
    let crop = crop.map(|c| CropType::from_name(&c)).unwrap_or_default();
    SoilReport {
        nutrients: assess_nutrient_availability(ph, ec, moisture),
        corrective_action: ph_corrective_action(ph),
        salinity: assess_salinity_stress(ec, crop),
        stress: soil_stress_index(moisture, Some(ec), Some(ph), temperature),
    }
}

pub fn show_soil(
    ph: f64,
    ec: f64,
    moisture: f64,
    temperature: f64,
    crop: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let report = soil_report(ph, ec, moisture, temperature, crop);

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let n = &report.nutrients;
            print_heading("Soil Health");
            print_rows(vec![
                FieldRow::new("Nutrient status", color_status(&label(&n.status))),
                FieldRow::new(
                    "Lockout",
                    n.lockout.as_ref().map(label).unwrap_or_else(|| "none".to_string()),
                ),
                FieldRow::new("Root burn risk", n.root_burn_risk),
                FieldRow::new(
                    "Available N/P/K (ppm)",
                    format!(
                        "{:.1} / {:.1} / {:.1}",
                        n.availability.nitrogen, n.availability.phosphorus, n.availability.potassium
                    ),
                ),
                FieldRow::new("Reason", n.primary_reason().unwrap_or("-")),
                FieldRow::new(
                    "pH action",
                    format!(
                        "{} ({} priority)",
                        report.corrective_action.action,
                        label(&report.corrective_action.priority)
                    ),
                ),
                FieldRow::new(
                    "Amendments",
                    if report.corrective_action.amendments.is_empty() {
                        "-".to_string()
                    } else {
                        report.corrective_action.amendments.join(", ")
                    },
                ),
                FieldRow::new(
                    &format!("Salinity ({} > {:.1} dS/m)", report.salinity.crop, report.salinity.threshold),
                    color_status(&label(&report.salinity.action)),
                ),
                FieldRow::new(
                    "Leaching requirement",
                    report
                        .salinity
                        .leaching_requirement
                        .map(|lr| format!("{:.3}", lr))
                        .unwrap_or_else(|| "-".to_string()),
                ),
                FieldRow::new(
                    "Stress index",
                    format!("{} ({})", color_index(report.stress.index), label(&report.stress.level)),
                ),
            ]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agronomy_lib::models::Operation;
    use agronomy_lib::soil::NutrientStatus;

    #[test]
    fn test_et0_report_blocks_in_high_wind() {
        let report = et0_report(35.0, 25.0, 25.0, 0.0, Some("tomato".into()), None);
        assert!(report.et0 > 6.0);
        assert_eq!(report.water_demand, WaterDemandLevel::High);
        assert_eq!(report.crop, CropType::Tomato);
        assert!(!report.wind.is_safe_for_spraying);
        assert!(report.wind.blocked_operations.contains(&Operation::SprayOn));
    }

    #[test]
    fn test_soil_report_acidic_lockout() {
        let report = soil_report(4.9, 1.0, 60.0, 22.0, None);
        assert_eq!(report.nutrients.status, NutrientStatus::Locked);
        assert_eq!(report.corrective_action.condition, "acidic");
        assert!(!report.salinity.is_stressed);
    }

    #[test]
    fn test_label_uses_serde_names() {
        assert_eq!(label(&NutrientStatus::Locked), "LOCKED");
        assert_eq!(label(&WaterDemandLevel::Moderate), "moderate");
    }
}
