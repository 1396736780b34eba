//! Offline analysis of recorded telemetry

use anyhow::{Context, Result};
use agronomy_lib::engine::{AgronomyEngine, AnalysisResult, EngineConfig};
use agronomy_lib::models::InputRecord;
use agronomy_lib::physics::{CropType, GrowthStage};
use agronomy_lib::predictor::{MlConfig, MlManager};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;

use super::label;
use crate::config::Settings;
use crate::output::{
    color_index, color_status, format_timestamp, print_info, print_json, print_rows,
    print_warning, OutputFormat,
};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub crop: Option<String>,
    pub stage: Option<String>,
    pub farm_id: String,
    pub use_models: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeReport {
    pub model_version: Option<String>,
    pub pump_events: usize,
    pub malformed_lines: Vec<usize>,
    pub results: Vec<AnalysisResult>,
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Moisture 24h")]
    moisture: String,
    #[tabled(rename = "ET0")]
    et0: String,
    #[tabled(rename = "SSI")]
    stress: String,
    #[tabled(rename = "Lock")]
    lock: String,
    #[tabled(rename = "Decisions")]
    decisions: String,
}

/// Run the engine over every record in `file`
pub fn analyze_file(path: &Path, settings: &Settings, options: &AnalyzeOptions) -> Result<AnalyzeReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {:?}", path))?;

    let manager = Arc::new(MlManager::new(MlConfig {
        model_dir: settings.model_dir.clone(),
        dataset_path: settings.dataset_path.clone(),
        ..Default::default()
    }));
    let mut engine = AgronomyEngine::new(
        EngineConfig {
            farm_id: options.farm_id.clone(),
            crop: options
                .crop
                .as_deref()
                .map(CropType::from_name)
                .unwrap_or_default(),
            growth_stage: options
                .stage
                .as_deref()
                .map(GrowthStage::from_name)
                .unwrap_or_default(),
            ..Default::default()
        },
        manager,
    );
    if options.use_models {
        engine.init();
    }

    let mut report = AnalyzeReport {
        model_version: engine.manager().model_version(),
        pump_events: 0,
        malformed_lines: Vec::new(),
        results: Vec::new(),
    };

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match InputRecord::parse(line) {
            Ok(InputRecord::Telemetry(packet)) => report.results.push(engine.analyze(&packet)),
            Ok(InputRecord::Pump(event)) => {
                engine.record_pump_event(event);
                report.pump_events += 1;
            }
            Err(_) => report.malformed_lines.push(index + 1),
        }
    }

    Ok(report)
}

fn describe_decisions(result: &AnalysisResult) -> String {
    if result.decisions.is_empty() {
        return "-".to_string();
    }
    result
        .decisions
        .iter()
        .map(|d| {
            let name = label(&d.decision_type);
            if d.is_vetoed() {
                format!("{} {}", name, "[vetoed]".red())
            } else {
                name
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn run(path: &Path, settings: &Settings, options: AnalyzeOptions, format: OutputFormat) -> Result<()> {
    let report = analyze_file(path, settings, &options)?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            match &report.model_version {
                Some(version) => print_info(&format!("Models {}", version.cyan())),
                None => print_warning("Running without models: physics and rules only"),
            }

            let rows: Vec<ResultRow> = report
                .results
                .iter()
                .map(|r| ResultRow {
                    time: format_timestamp(r.timestamp),
                    moisture: r
                        .forecast
                        .points
                        .last()
                        .map_or_else(|| "-".to_string(), |p| format!("{:.1}%", p.soil_moisture)),
                    et0: format!("{:.2}", r.water_budget.et0),
                    stress: color_index(r.soil_stress.index),
                    lock: color_status(&label(&r.safety_lock.status)),
                    decisions: describe_decisions(r),
                })
                .collect();
            print_rows(rows);

            println!(
                "\nTotal: {} packets, {} pump events",
                report.results.len(),
                report.pump_events
            );
            if !report.malformed_lines.is_empty() {
                print_warning(&format!(
                    "Skipped malformed lines: {:?}",
                    report.malformed_lines
                ));
            }
        }
    }
    Ok(())
}
