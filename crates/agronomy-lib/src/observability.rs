//! Observability infrastructure for the agronomy engine
//!
//! Provides:
//! - Prometheus metrics (analysis latency, retrain latency, learning buffer, model version)
//! - Structured event logging with tracing

use crate::models::Operation;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Buckets for per-packet analysis latency (seconds)
const ANALYSIS_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Buckets for retrain latency (seconds)
const RETRAIN_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    analysis_latency_seconds: Histogram,
    retrain_latency_seconds: Histogram,
    learning_buffer_items: IntGauge,
    model_version_info: GaugeVec,
    packets_analyzed: IntCounter,
    decisions_emitted: IntCounter,
    safety_locks_engaged: IntCounter,
    packets_rejected: IntCounter,
    prediction_errors: IntCounter,
    retrains_completed: IntCounter,
    retrains_rejected: IntCounter,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            analysis_latency_seconds: register_histogram!(
                "agronomy_analysis_latency_seconds",
                "Time spent analysing one sensor packet",
                ANALYSIS_BUCKETS.to_vec()
            )
            .expect("Failed to register analysis_latency_seconds"),

            retrain_latency_seconds: register_histogram!(
                "agronomy_retrain_latency_seconds",
                "Time spent refitting the model bundle",
                RETRAIN_BUCKETS.to_vec()
            )
            .expect("Failed to register retrain_latency_seconds"),

            learning_buffer_items: register_int_gauge!(
                "agronomy_learning_buffer_items",
                "Validated packets waiting for the next retrain"
            )
            .expect("Failed to register learning_buffer_items"),

            model_version_info: register_gauge_vec!(
                "agronomy_model_version_info",
                "Currently active model bundle",
                &["version", "origin"]
            )
            .expect("Failed to register model_version_info"),

            packets_analyzed: register_int_counter!(
                "agronomy_packets_analyzed_total",
                "Sensor packets analysed"
            )
            .expect("Failed to register packets_analyzed"),

            decisions_emitted: register_int_counter!(
                "agronomy_decisions_emitted_total",
                "AI decisions emitted across all subsystems"
            )
            .expect("Failed to register decisions_emitted"),

            safety_locks_engaged: register_int_counter!(
                "agronomy_safety_locks_engaged_total",
                "Packets for which the spray safety lock engaged"
            )
            .expect("Failed to register safety_locks_engaged"),

            packets_rejected: register_int_counter!(
                "agronomy_packets_rejected_total",
                "Packets kept out of the learning buffer by validation"
            )
            .expect("Failed to register packets_rejected"),

            prediction_errors: register_int_counter!(
                "agronomy_prediction_errors_total",
                "Model predictions that could not be produced"
            )
            .expect("Failed to register prediction_errors"),

            retrains_completed: register_int_counter!(
                "agronomy_retrains_completed_total",
                "Retrains whose bundle was swapped in"
            )
            .expect("Failed to register retrains_completed"),

            retrains_rejected: register_int_counter!(
                "agronomy_retrains_rejected_total",
                "Retrains rejected by holdout validation or failed"
            )
            .expect("Failed to register retrains_rejected"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EngineMetrics")
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_analysis_latency(&self, duration_secs: f64) {
        self.inner().analysis_latency_seconds.observe(duration_secs);
    }

    pub fn observe_retrain_latency(&self, duration_secs: f64) {
        self.inner().retrain_latency_seconds.observe(duration_secs);
    }

    pub fn set_learning_buffer_items(&self, items: usize) {
        self.inner().learning_buffer_items.set(items as i64);
    }

    /// Replace the active version label; `origin` is "bootstrap" or "field"
    pub fn set_model_version(&self, version: &str, origin: &str) {
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version, origin])
            .set(1.0);
    }

    pub fn inc_packets_analyzed(&self) {
        self.inner().packets_analyzed.inc();
    }

    pub fn add_decisions_emitted(&self, count: usize) {
        self.inner().decisions_emitted.inc_by(count as u64);
    }

    pub fn inc_safety_locks(&self) {
        self.inner().safety_locks_engaged.inc();
    }

    pub fn inc_packets_rejected(&self) {
        self.inner().packets_rejected.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    pub fn inc_retrains_completed(&self) {
        self.inner().retrains_completed.inc();
    }

    pub fn inc_retrains_rejected(&self) {
        self.inner().retrains_rejected.inc();
    }

    /// Default registry in the Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        self.inner();
        prometheus::TextEncoder::new().encode_to_string(&prometheus::gather())
    }
}

/// Structured logger for engine events
///
/// Every line carries an `event` field and the farm id so downstream log
/// pipelines can filter without parsing messages.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    farm_id: String,
}

impl StructuredLogger {
    pub fn new(farm_id: impl Into<String>) -> Self {
        Self {
            farm_id: farm_id.into(),
        }
    }

    pub fn farm_id(&self) -> &str {
        &self.farm_id
    }

    pub fn log_analysis(
        &self,
        decisions: usize,
        safety_locked: bool,
        stress_index: f64,
        latency_us: u128,
    ) {
        info!(
            event = "analysis_completed",
            farm_id = %self.farm_id,
            decisions = decisions,
            safety_locked = safety_locked,
            stress_index = stress_index,
            latency_us = latency_us as u64,
            "Sensor packet analysed"
        );
    }

    pub fn log_safety_lock(&self, wind_speed_kmh: f64, blocked: &[Operation]) {
        warn!(
            event = "safety_lock_engaged",
            farm_id = %self.farm_id,
            wind_speed_kmh = wind_speed_kmh,
            blocked_operations = ?blocked,
            "Drift safety lock engaged"
        );
    }

    pub fn log_nutrient_lockout(&self, soil_ph: f64, lockout: &str, status: &str) {
        warn!(
            event = "nutrient_lockout",
            farm_id = %self.farm_id,
            soil_ph = soil_ph,
            lockout = %lockout,
            status = %status,
            "Nutrient uptake locked out"
        );
    }

    pub fn log_model_retrained(
        &self,
        old_version: &str,
        new_version: &str,
        rows: usize,
        accepted: bool,
    ) {
        if accepted {
            info!(
                event = "model_retrained",
                farm_id = %self.farm_id,
                old_version = %old_version,
                new_version = %new_version,
                rows = rows,
                "Model bundle retrained and swapped in"
            );
        } else {
            warn!(
                event = "model_retrained",
                farm_id = %self.farm_id,
                old_version = %old_version,
                new_version = %new_version,
                rows = rows,
                accepted = false,
                "Retrained bundle rejected, keeping previous version"
            );
        }
    }

    pub fn log_packet_rejected(&self, reason: &str) {
        info!(
            event = "packet_rejected",
            farm_id = %self.farm_id,
            reason = %reason,
            "Packet excluded from learning buffer"
        );
    }

    pub fn log_startup(&self, version: &str, model_version: &str) {
        info!(
            event = "engine_started",
            farm_id = %self.farm_id,
            engine_version = %version,
            model_version = %model_version,
            "Agronomy engine started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            farm_id = %self.farm_id,
            reason = %reason,
            "Agronomy engine shutting down"
        );
    }
}
