//! Per-packet analysis output
//!
//! An [`AnalysisResult`] is built once by the engine and never mutated
//! afterwards. Every numeric field is already rounded for JSON output.

use crate::models::{Operation, Subsystem};
use crate::physics::{
    CropType, GrowthStage, SalinityStress, WaterDemandLevel, WindSafety,
};
use crate::predictor::{
    DiseaseFeatures, DiseasePrediction, IngestOutcome, RetrainOutcome, WaterDemandPrediction,
};
use crate::soil::{NpkLevels, NutrientAssessment, NutrientStatus, PhCorrectiveAction, SoilStressIndex};
use serde::{Deserialize, Serialize};

/// Forecast horizons in hours
pub const FORECAST_HORIZONS_HOURS: [u32; 3] = [6, 12, 24];

pub const FORECAST_SOURCE: &str = "physics_projection";
pub const FORECAST_NOTE: &str = "Linear ET0 projection, not a measurement";

/// Kind of recommendation carried by an [`AiDecision`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    PreemptiveIrrigation,
    NutrientLockout,
    RootBurnRisk,
    NutrientAdvisory,
    DiseaseAlert,
    DiseaseWatch,
}

/// Attached to a decision whose action the safety lock blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Veto {
    pub blocked_operation: Operation,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterPayload {
    pub reasoning: String,
    pub predicted_loss_24h: f64,
    /// Loss discounted by drift confidence
    pub adjusted_loss_24h: f64,
    pub future_moisture: f64,
    pub time_to_critical_hours: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientPayload {
    pub reasoning: String,
    pub status: NutrientStatus,
    pub lockout: bool,
    pub root_burn_risk: bool,
    pub corrective_action: PhCorrectiveAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseasePayload {
    pub reasoning: String,
    pub probability: f64,
    pub application_blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecisionPayload {
    Water(WaterPayload),
    Nutrient(NutrientPayload),
    Disease(DiseasePayload),
}

/// One ranked recommendation; list order is emission order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiDecision {
    #[serde(rename = "type")]
    pub decision_type: DecisionType,
    pub subsystem: Subsystem,
    pub payload: DecisionPayload,
    /// Actuator operation the decision calls for, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub veto: Option<Veto>,
}

impl AiDecision {
    pub fn is_vetoed(&self) -> bool {
        self.veto.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterBudget {
    pub et0: f64,
    pub etc: f64,
    pub crop: CropType,
    pub growth_stage: GrowthStage,
    pub crop_coefficient: f64,
    pub demand_level: WaterDemandLevel,
    pub prediction: Option<WaterDemandPrediction>,
    /// Agreement between the previous prediction and the measured moisture
    pub drift_confidence: Option<f64>,
    pub adjusted_loss_24h: Option<f64>,
    pub irrigation_cycles: usize,
    pub average_irrigation_efficiency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Nutrient section; the rule-based status is authoritative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilHealth {
    pub status: NutrientStatus,
    pub rule_based: NutrientAssessment,
    /// Model estimate, reported alongside and never substituted
    pub ml_prediction: Option<NpkLevels>,
    pub ml_confidence: Option<f64>,
    pub salinity: SalinityStress,
    pub corrective_action: PhCorrectiveAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseAssessment {
    pub features: Option<DiseaseFeatures>,
    pub prediction: Option<DiseasePrediction>,
    pub application_blocked: bool,
    pub block_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericSafety {
    pub wind: WindSafety,
    /// Wind was absent from the packet and the reference speed was assumed
    pub wind_assumed: bool,
    pub water_demand: WaterDemandLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub hours: u32,
    pub soil_moisture: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoistureForecast {
    pub source: String,
    pub note: String,
    pub points: Vec<ForecastPoint>,
}

impl MoistureForecast {
    /// `max(0, moisture - et0 * h / 24)` for each horizon
    pub fn project(soil_moisture: f64, et0: f64) -> Self {
        let points = FORECAST_HORIZONS_HOURS
            .iter()
            .map(|&hours| ForecastPoint {
                hours,
                soil_moisture: crate::models::round_to(
                    (soil_moisture - et0 * hours as f64 / 24.0).max(0.0),
                    1,
                ),
            })
            .collect();
        Self {
            source: FORECAST_SOURCE.to_string(),
            note: FORECAST_NOTE.to_string(),
            points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    Locked,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyLock {
    pub status: LockStatus,
    pub blocked_operations: Vec<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SafetyLock {
    pub fn clear() -> Self {
        Self {
            status: LockStatus::Clear,
            blocked_operations: Vec::new(),
            reason: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status == LockStatus::Locked
    }

    pub fn blocks(&self, operation: Operation) -> bool {
        self.blocked_operations.contains(&operation)
    }
}

/// What the learning pipeline did with the packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LearningStatus {
    /// Models not loaded, nothing to learn into
    Skipped,
    Rejected { reason: String },
    Buffered { len: usize },
    RetrainQueued,
    RetrainDropped,
    Retrained { version: String, graduated: bool },
    RetrainRejected,
    RetrainFailed { error: String },
}

impl From<IngestOutcome> for LearningStatus {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Buffered { len } => LearningStatus::Buffered { len },
            IngestOutcome::RetrainQueued => LearningStatus::RetrainQueued,
            IngestOutcome::RetrainDropped => LearningStatus::RetrainDropped,
            IngestOutcome::Retrained(RetrainOutcome::Swapped {
                version, graduated, ..
            }) => LearningStatus::Retrained { version, graduated },
            IngestOutcome::Retrained(RetrainOutcome::Rejected { .. }) => {
                LearningStatus::RetrainRejected
            }
            IngestOutcome::RetrainFailed(error) => LearningStatus::RetrainFailed { error },
        }
    }
}

/// Full output for one sensor packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub farm_id: String,
    pub timestamp: i64,
    pub model_version: Option<String>,
    pub is_bootstrapped: bool,
    pub water_budget: WaterBudget,
    /// Absent when the packet carries no EC or pH
    pub soil_health: Option<SoilHealth>,
    pub disease: DiseaseAssessment,
    pub atmospheric_safety: AtmosphericSafety,
    pub forecast: MoistureForecast,
    pub soil_stress: SoilStressIndex,
    pub safety_lock: SafetyLock,
    pub decisions: Vec<AiDecision>,
    pub learning: LearningStatus,
}

impl AnalysisResult {
    pub fn decisions_for(&self, subsystem: Subsystem) -> impl Iterator<Item = &AiDecision> + '_ {
        self.decisions.iter().filter(move |d| d.subsystem == subsystem)
    }
}
