//! Decision fusion and safety interlocks
//!
//! `AgronomyEngine` evaluates one sensor packet at a time against the physics
//! models, the rule-based soft-sensor and the ML manager, then applies hard
//! safety overrides. It owns the rolling climate history and the irrigation
//! cycle log; the ML manager is injected so the same manager can be shared
//! with a retrain worker.
//!
//! Decisions are emitted in a fixed order (WATER, NUTRIENT, DISEASE) and the
//! wind lock annotates the decisions it vetoes in place.

mod result;


pub use result::{
    AiDecision, AnalysisResult, AtmosphericSafety, DecisionPayload, DecisionType,
    DiseaseAssessment, DiseasePayload, ForecastPoint, LearningStatus, LockStatus,
    MoistureForecast, NutrientPayload, SafetyLock, SoilHealth, Veto, WaterBudget, WaterPayload,
    FORECAST_HORIZONS_HOURS, FORECAST_NOTE, FORECAST_SOURCE,
};

use crate::error::PredictionError;
use crate::history::{ClimateHistory, IrrigationLog, DEFAULT_CYCLE_CAPACITY, DEFAULT_HISTORY_CAPACITY};
use crate::models::{round_to, IrrigationCycle, Operation, PumpEvent, SensorPacket, Subsystem};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::physics::{
    assess_salinity_stress, calculate_et0_at, check_wind_safety, crop_coefficient,
    crop_evapotranspiration, water_demand_level, CropType, GrowthStage,
    WIND_SAFETY_THRESHOLD_KMH,
};
use crate::predictor::{
    calculate_drift_confidence, DiseaseFeatures, FeatureExtractor, InitOutcome, MlManager,
    SignalKind, WaterEvent,
};
use crate::soil::{
    assess_nutrient_availability, ph_corrective_action, soil_stress_index, NutrientStatus,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub farm_id: String,
    pub crop: CropType,
    pub growth_stage: GrowthStage,
    /// Station elevation for the psychrometric constant (m)
    pub elevation_m: f64,
    /// Climate samples kept for disease features
    pub history_capacity: usize,
    pub irrigation_cycle_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            farm_id: "default".to_string(),
            crop: CropType::default(),
            growth_stage: GrowthStage::default(),
            elevation_m: 0.0,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            irrigation_cycle_capacity: DEFAULT_CYCLE_CAPACITY,
        }
    }
}

/// Moisture trajectory implied by the last water prediction
#[derive(Debug, Clone, Copy)]
struct WaterTrack {
    timestamp: i64,
    soil_moisture: f64,
    hourly_loss: f64,
}

impl WaterTrack {
    fn expected_at(&self, timestamp: i64) -> f64 {
        let elapsed_hours = (timestamp - self.timestamp).max(0) as f64 / 3600.0;
        (self.soil_moisture - self.hourly_loss * elapsed_hours).clamp(0.0, 100.0)
    }
}

pub struct AgronomyEngine {
    config: EngineConfig,
    manager: Arc<MlManager>,
    history: ClimateHistory,
    irrigation: IrrigationLog,
    features: FeatureExtractor,
    last_water: Option<WaterTrack>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl std::fmt::Debug for AgronomyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgronomyEngine")
            .field("farm_id", &self.config.farm_id)
            .field("crop", &self.config.crop)
            .field("history", &self.history.len())
            .field("manager", &self.manager)
            .finish()
    }
}

impl AgronomyEngine {
    pub fn new(config: EngineConfig, manager: Arc<MlManager>) -> Self {
        let logger = StructuredLogger::new(config.farm_id.clone());
        Self {
            history: ClimateHistory::new(config.history_capacity),
            irrigation: IrrigationLog::new(config.irrigation_cycle_capacity),
            features: FeatureExtractor::new(),
            last_water: None,
            metrics: EngineMetrics::new(),
            logger,
            manager,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<MlManager> {
        &self.manager
    }

    pub fn history(&self) -> &ClimateHistory {
        &self.history
    }

    pub fn irrigation(&self) -> &IrrigationLog {
        &self.irrigation
    }

    /// Load or build the models; failure leaves the engine running without them
    pub fn init(&self) -> Option<InitOutcome> {
        let outcome = match self.manager.init() {
            Ok(outcome) => {
                info!(outcome = ?outcome, "Models ready");
                Some(outcome)
            }
            Err(e) => {
                error!(error = %format!("{:#}", e), "Model initialization failed, inference disabled");
                None
            }
        };

        let model_version = self
            .manager
            .model_version()
            .unwrap_or_else(|| "none".to_string());
        self.logger
            .log_startup(env!("CARGO_PKG_VERSION"), &model_version);
        outcome
    }

    pub fn shutdown(&self, reason: &str) {
        self.manager.stop_worker();
        self.logger.log_shutdown(reason);
    }

    /// Feed a pump actuator event into the irrigation cycle log
    pub fn record_pump_event(&mut self, event: PumpEvent) -> Option<IrrigationCycle> {
        let cycle = self.irrigation.record(event);
        match &cycle {
            Some(cycle) => info!(
                runtime_minutes = cycle.runtime_minutes,
                moisture_gain = cycle.moisture_gain,
                efficiency = cycle.efficiency,
                "Irrigation cycle completed"
            ),
            None => debug!(event = ?event, "Pump event recorded"),
        }
        cycle
    }

    /// Evaluate one packet and return the fused decision set
    pub fn analyze(&mut self, packet: &SensorPacket) -> AnalysisResult {
        let start = Instant::now();
        let timestamp = packet
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        let wind_speed = packet.wind_speed_or_default();
        let model_version = self.manager.model_version();
        let is_bootstrapped = self.manager.is_bootstrapped();
        let mut decisions = Vec::new();

        // 1. rolling history
        self.history
            .record(timestamp, packet.temperature, packet.humidity);

        // 2. reference and crop evapotranspiration
        let et0 = calculate_et0_at(
            packet.temperature,
            packet.humidity,
            wind_speed,
            self.config.elevation_m,
        );
        let kc = crop_coefficient(self.config.crop, self.config.growth_stage);
        let etc = crop_evapotranspiration(et0, kc);

        // 3. water demand
        let water_budget = self.water_step(packet, timestamp, wind_speed, et0, etc, kc, &mut decisions);

        // 4. nutrients
        let soil_health = self.nutrient_step(packet, &mut decisions);

        // 5. disease with spray interlock
        let disease_features = self.features.disease_features(&self.history);
        let disease = self.disease_step(disease_features, wind_speed, &mut decisions);

        // 6. atmospheric safety
        let wind = check_wind_safety(wind_speed);
        let atmospheric_safety = AtmosphericSafety {
            wind: wind.clone(),
            wind_assumed: packet.wind_speed.is_none(),
            water_demand: water_demand_level(et0),
        };

        // 7. digital-twin forecast
        let forecast = MoistureForecast::project(packet.soil_moisture, et0);

        // 8. soil stress index
        let soil_stress = soil_stress_index(
            packet.soil_moisture,
            packet.ec_salinity,
            packet.soil_ph,
            packet.temperature,
        );

        // 9. drift lock, vetoing emitted decisions in place
        let safety_lock = if wind.is_safe_for_spraying {
            SafetyLock::clear()
        } else {
            let reason = format!(
                "Wind {:.1} km/h exceeds the {:.0} km/h drift limit",
                wind_speed, WIND_SAFETY_THRESHOLD_KMH
            );
            let lock = SafetyLock {
                status: LockStatus::Locked,
                blocked_operations: wind.blocked_operations.clone(),
                reason: Some(reason.clone()),
            };
            for decision in decisions.iter_mut() {
                if let Some(operation) = decision.operation.filter(|op| lock.blocks(*op)) {
                    decision.veto = Some(Veto {
                        blocked_operation: operation,
                        reason: reason.clone(),
                    });
                }
            }
            self.metrics.inc_safety_locks();
            self.logger
                .log_safety_lock(wind_speed, &lock.blocked_operations);
            lock
        };

        // 10. learning, never fatal
        let learning = self.learning_step(packet, timestamp, et0, disease_features);

        let elapsed = start.elapsed();
        self.metrics.inc_packets_analyzed();
        self.metrics.add_decisions_emitted(decisions.len());
        self.metrics.observe_analysis_latency(elapsed.as_secs_f64());
        self.logger.log_analysis(
            decisions.len(),
            safety_lock.is_locked(),
            soil_stress.index,
            elapsed.as_micros(),
        );

        AnalysisResult {
            farm_id: self.config.farm_id.clone(),
            timestamp,
            model_version,
            is_bootstrapped,
            water_budget,
            soil_health,
            disease,
            atmospheric_safety,
            forecast,
            soil_stress,
            safety_lock,
            decisions,
            learning,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn water_step(
        &mut self,
        packet: &SensorPacket,
        timestamp: i64,
        wind_speed: f64,
        et0: f64,
        etc: f64,
        kc: f64,
        decisions: &mut Vec<AiDecision>,
    ) -> WaterBudget {
        let drift_confidence = self.last_water.map(|track| {
            calculate_drift_confidence(
                packet.soil_moisture,
                track.expected_at(timestamp),
                SignalKind::Moisture,
            )
        });

        let mut budget = WaterBudget {
            et0: round_to(et0, 2),
            etc: round_to(etc, 2),
            crop: self.config.crop,
            growth_stage: self.config.growth_stage,
            crop_coefficient: round_to(kc, 2),
            demand_level: water_demand_level(et0),
            prediction: None,
            drift_confidence: drift_confidence.map(|c| round_to(c, 3)),
            adjusted_loss_24h: None,
            irrigation_cycles: self.irrigation.cycles().len(),
            average_irrigation_efficiency: self
                .irrigation
                .average_efficiency()
                .map(|e| round_to(e, 3)),
            error: None,
        };

        let prediction = match self.manager.predict_water_demand(
            packet.soil_moisture,
            packet.temperature,
            packet.humidity,
            wind_speed,
            et0,
        ) {
            Ok(prediction) => prediction,
            Err(e) => {
                self.prediction_failed(Subsystem::Water, &e);
                budget.error = Some(e.to_string());
                return budget;
            }
        };

        let confidence = drift_confidence.unwrap_or(1.0);
        let adjusted_loss = round_to(prediction.predicted_loss_24h * confidence, 2);
        budget.prediction = Some(prediction);
        budget.adjusted_loss_24h = Some(adjusted_loss);

        self.last_water = Some(WaterTrack {
            timestamp,
            soil_moisture: packet.soil_moisture,
            hourly_loss: prediction.hourly_loss(),
        });

        if prediction.event == WaterEvent::PreemptiveIrrigation {
            decisions.push(AiDecision {
                decision_type: DecisionType::PreemptiveIrrigation,
                subsystem: Subsystem::Water,
                payload: DecisionPayload::Water(WaterPayload {
                    reasoning: format!(
                        "Predicted loss of {:.1}% over 24h reaches critical moisture in {:.1}h",
                        prediction.predicted_loss_24h, prediction.time_to_critical_hours
                    ),
                    predicted_loss_24h: prediction.predicted_loss_24h,
                    adjusted_loss_24h: adjusted_loss,
                    future_moisture: prediction.future_moisture,
                    time_to_critical_hours: prediction.time_to_critical_hours,
                    confidence: round_to(confidence, 3),
                }),
                operation: None,
                veto: None,
            });
        }

        budget
    }

    fn nutrient_step(
        &self,
        packet: &SensorPacket,
        decisions: &mut Vec<AiDecision>,
    ) -> Option<SoilHealth> {
        let (ec, ph) = match (packet.ec_salinity, packet.soil_ph) {
            (Some(ec), Some(ph)) => (ec, ph),
            _ => {
                debug!("Packet carries no EC/pH, skipping nutrient analysis");
                return None;
            }
        };

        let rules = assess_nutrient_availability(ph, ec, packet.soil_moisture);
        let corrective_action = ph_corrective_action(ph);
        let salinity = assess_salinity_stress(ec, self.config.crop);

        let (ml_prediction, ml_confidence, error) =
            match self.manager.predict_nutrients(ph, ec, packet.soil_moisture) {
                Ok(npk) => {
                    let confidence = calculate_drift_confidence(
                        rules.availability.nitrogen,
                        npk.nitrogen,
                        SignalKind::Nutrient,
                    );
                    (Some(npk), Some(round_to(confidence, 3)), None)
                }
                Err(e) => {
                    self.prediction_failed(Subsystem::Nutrient, &e);
                    (None, None, Some(e.to_string()))
                }
            };

        if let Some(lockout) = rules.lockout {
            let lockout = format!("{:?}", lockout).to_lowercase();
            let status = format!("{:?}", rules.status).to_uppercase();
            self.logger.log_nutrient_lockout(ph, &lockout, &status);
        }

        let (decision_type, operation, reasoning) = match rules.status {
            NutrientStatus::Critical => (
                DecisionType::RootBurnRisk,
                None,
                format!(
                    "Root burn risk: EC {:.2} dS/m with soil moisture {:.1}%; withhold fertilizer and irrigate to leach salts",
                    ec, packet.soil_moisture
                ),
            ),
            NutrientStatus::Locked => (
                DecisionType::NutrientLockout,
                Some(Operation::FertilizeOn),
                format!(
                    "{} at pH {:.1}; {}",
                    rules.primary_reason().unwrap_or("Nutrient lockout"),
                    ph,
                    corrective_action.action
                ),
            ),
            NutrientStatus::Optimal => (
                DecisionType::NutrientAdvisory,
                Some(Operation::FertilizeOn),
                format!("Nutrients available at pH {:.1}; {}", ph, corrective_action.action),
            ),
        };

        decisions.push(AiDecision {
            decision_type,
            subsystem: Subsystem::Nutrient,
            payload: DecisionPayload::Nutrient(NutrientPayload {
                reasoning,
                status: rules.status,
                lockout: rules.is_locked(),
                root_burn_risk: rules.root_burn_risk,
                corrective_action: corrective_action.clone(),
            }),
            operation,
            veto: None,
        });

        Some(SoilHealth {
            status: rules.status,
            rule_based: rules,
            ml_prediction,
            ml_confidence,
            salinity,
            corrective_action,
            error,
        })
    }

    fn disease_step(
        &self,
        features: Option<DiseaseFeatures>,
        wind_speed: f64,
        decisions: &mut Vec<AiDecision>,
    ) -> DiseaseAssessment {
        let mut assessment = DiseaseAssessment {
            features: features.map(|f| DiseaseFeatures {
                mean_temperature_window: round_to(f.mean_temperature_window, 1),
                humidity_duration_hours: f.humidity_duration_hours,
                temperature_range: round_to(f.temperature_range, 1),
            }),
            prediction: None,
            application_blocked: false,
            block_reason: None,
            error: None,
        };

        let Some(features) = features else {
            return assessment;
        };

        let prediction = match self.manager.predict_disease_risk(&features) {
            Ok(prediction) => prediction,
            Err(e) => {
                self.prediction_failed(Subsystem::Disease, &e);
                assessment.error = Some(e.to_string());
                return assessment;
            }
        };
        assessment.prediction = Some(prediction);

        if prediction.is_high_risk() && wind_speed > WIND_SAFETY_THRESHOLD_KMH {
            let reason = format!(
                "Spraying blocked: high disease risk but wind {:.1} km/h exceeds the {:.0} km/h drift limit",
                wind_speed, WIND_SAFETY_THRESHOLD_KMH
            );
            warn!(wind_speed_kmh = wind_speed, probability = prediction.probability, "Disease spray interlock engaged");
            assessment.application_blocked = true;
            assessment.block_reason = Some(reason);
        }

        let (decision_type, operation, reasoning) = if prediction.is_high_risk() {
            (
                DecisionType::DiseaseAlert,
                Some(Operation::SprayOn),
                format!(
                    "Leaf wetness {:.0}h at mean {:.1}°C favours infection; protective spray advised",
                    features.humidity_duration_hours, features.mean_temperature_window
                ),
            )
        } else {
            (
                DecisionType::DiseaseWatch,
                None,
                format!(
                    "Infection risk low ({:.0}h leaf wetness); continue monitoring",
                    features.humidity_duration_hours
                ),
            )
        };

        decisions.push(AiDecision {
            decision_type,
            subsystem: Subsystem::Disease,
            payload: DecisionPayload::Disease(DiseasePayload {
                reasoning,
                probability: prediction.probability,
                application_blocked: assessment.application_blocked,
                block_reason: assessment.block_reason.clone(),
            }),
            operation,
            veto: None,
        });

        assessment
    }

    fn learning_step(
        &self,
        packet: &SensorPacket,
        timestamp: i64,
        et0: f64,
        disease: Option<DiseaseFeatures>,
    ) -> LearningStatus {
        if !self.manager.models_loaded() {
            return LearningStatus::Skipped;
        }
        match self.manager.ingest(packet, timestamp, et0, disease) {
            Ok(outcome) => outcome.into(),
            Err(e) => LearningStatus::Rejected {
                reason: e.to_string(),
            },
        }
    }

    fn prediction_failed(&self, subsystem: Subsystem, e: &PredictionError) {
        match e {
            PredictionError::ModelsNotLoaded | PredictionError::DiseaseModelUnavailable => {
                debug!(subsystem = ?subsystem, error = %e, "Model unavailable, skipping prediction")
            }
            _ => {
                self.metrics.inc_prediction_errors();
                warn!(subsystem = ?subsystem, error = %e, "Prediction failed");
            }
        }
    }
}
