//! Core data models for the agronomy engine

use serde::{Deserialize, Serialize};

/// Wind speed assumed when a packet carries none (2.0 m/s, the FAO-56 reference)
pub const DEFAULT_WIND_SPEED_KMH: f64 = 7.2;

/// One telemetry arrival from a field station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPacket {
    /// Volumetric soil moisture, percent
    pub soil_moisture: f64,
    /// Air temperature, °C
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// Wind speed, km/h
    #[serde(default)]
    pub wind_speed: Option<f64>,
    /// Soil electrical conductivity, dS/m
    #[serde(default)]
    pub ec_salinity: Option<f64>,
    #[serde(default)]
    pub soil_ph: Option<f64>,
    /// Unix seconds; arrival time is used when absent
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl SensorPacket {
    pub fn new(soil_moisture: f64, temperature: f64, humidity: f64) -> Self {
        Self {
            soil_moisture,
            temperature,
            humidity,
            wind_speed: None,
            ec_salinity: None,
            soil_ph: None,
            timestamp: None,
        }
    }

    pub fn with_wind(mut self, wind_speed: f64) -> Self {
        self.wind_speed = Some(wind_speed);
        self
    }

    pub fn with_soil(mut self, ec_salinity: f64, soil_ph: f64) -> Self {
        self.ec_salinity = Some(ec_salinity);
        self.soil_ph = Some(soil_ph);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn wind_speed_or_default(&self) -> f64 {
        self.wind_speed.unwrap_or(DEFAULT_WIND_SPEED_KMH)
    }
}

/// One sample in the rolling climate window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: i64,
    pub temperature: f64,
    pub humidity: f64,
}

/// A completed irrigation run, derived from a PUMP_ON/PUMP_OFF pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrrigationCycle {
    /// Pump start, unix seconds
    pub timestamp: i64,
    pub runtime_minutes: f64,
    /// Moisture percentage points gained during the run
    pub moisture_gain: f64,
    /// Percentage points gained per minute of runtime
    pub efficiency: f64,
}

/// Pump actuator events reported by the field controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PumpEvent {
    PumpOn { timestamp: i64, soil_moisture: f64 },
    PumpOff { timestamp: i64, soil_moisture: f64 },
}

/// One JSON line accepted by the hosts, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputRecord {
    Telemetry(SensorPacket),
    Pump(PumpEvent),
}

impl InputRecord {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Field subsystem a decision belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Subsystem {
    Water,
    Nutrient,
    Disease,
}

/// Actuator operations that safety interlocks can block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    SprayOn,
    FertilizeOn,
}

/// Operations blocked whenever wind rules out application
pub const WIND_BLOCKED_OPERATIONS: [Operation; 2] = [Operation::SprayOn, Operation::FertilizeOn];

/// Round to a fixed number of decimals for JSON output
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
