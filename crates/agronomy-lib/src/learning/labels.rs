//! Training targets
//!
//! Synthetic bootstrap rows are labelled with physics rules. Live rows take
//! their moisture target from the readings that follow them in the same
//! batch, extrapolated to 24 h, and fall back to the rule only when no clean
//! drying span follows the reading (end of batch, irrigation, rain).

use super::buffer::LearningEntry;
use super::dataset::TrainingRow;
use crate::predictor::DiseaseFeatures;
use crate::soil::assess_nutrient_availability;
use tracing::debug;

/// Moisture percentage points lost per mm/day of ET0
const LOSS_PER_MM_ET0: f64 = 0.9;

/// Extra evaporative loss per km/h of wind
const LOSS_PER_KMH_WIND: f64 = 0.04;

/// Above this moisture the profile drains freely
const DRAINAGE_ONSET_MOISTURE: f64 = 60.0;
const DRAINAGE_RATE: f64 = 0.05;

/// Leaf wetness (hours) needed for fungal infection
const INFECTION_WETNESS_HOURS: f64 = 6.0;
const INFECTION_TEMP_MIN: f64 = 15.0;
const INFECTION_TEMP_MAX: f64 = 30.0;

/// Shortest measured span worth extrapolating to 24 h
const MIN_OBSERVED_SPAN_HOURS: f64 = 1.0;
const MAX_OBSERVED_SPAN_HOURS: f64 = 24.0;

/// A rise above this between consecutive readings is a wetting event
const WETTING_RISE: f64 = 0.5;

/// Expected change in soil moisture over the next 24 hours (negative = loss)
pub fn moisture_delta_next_24h(soil_moisture: f64, wind_speed: f64, et0: f64) -> f64 {
    let drainage = (soil_moisture - DRAINAGE_ONSET_MOISTURE).max(0.0) * DRAINAGE_RATE;
    -(LOSS_PER_MM_ET0 * et0 + LOSS_PER_KMH_WIND * wind_speed + drainage)
}

/// Infection-favourable conditions: a long wet spell at mild temperature
pub fn disease_label(features: &DiseaseFeatures) -> bool {
    features.humidity_duration_hours >= INFECTION_WETNESS_HOURS
        && (INFECTION_TEMP_MIN..=INFECTION_TEMP_MAX).contains(&features.mean_temperature_window)
}

/// Measured moisture change after `entries[index]`, scaled to 24 h
///
/// Walks forward through chronological readings, stopping at a wetting event,
/// a timestamp that goes backwards or the end of the span window. `None` when
/// less than [`MIN_OBSERVED_SPAN_HOURS`] of clean drying was seen.
pub fn observed_moisture_delta_24h(entries: &[LearningEntry], index: usize) -> Option<f64> {
    let start = entries.get(index)?;
    let mut previous = start;
    let mut observed = None;

    for next in &entries[index + 1..] {
        let span_hours = (next.timestamp - start.timestamp) as f64 / 3600.0;
        if next.timestamp <= previous.timestamp
            || span_hours > MAX_OBSERVED_SPAN_HOURS
            || next.packet.soil_moisture - previous.packet.soil_moisture > WETTING_RISE
        {
            break;
        }
        if span_hours >= MIN_OBSERVED_SPAN_HOURS {
            observed = Some((next.packet.soil_moisture - start.packet.soil_moisture) / span_hours * 24.0);
        }
        previous = next;
    }

    observed.map(|delta| delta.clamp(-100.0, 100.0))
}

/// Label a drained batch, preferring measured moisture targets
pub fn label_batch(entries: &[LearningEntry]) -> Vec<TrainingRow> {
    let mut measured = 0;
    let rows: Vec<TrainingRow> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let mut row = label_entry(entry);
            if let Some(delta) = observed_moisture_delta_24h(entries, i) {
                row.moisture_delta_next_24h = delta;
                measured += 1;
            }
            row
        })
        .collect();

    debug!(rows = rows.len(), measured, "Labelled learning batch");
    rows
}

/// Turn a buffered live entry into a dataset row with rule-based targets
pub fn label_entry(entry: &LearningEntry) -> TrainingRow {
    let p = &entry.packet;
    let nutrients =
        assess_nutrient_availability(p.soil_ph, p.ec_salinity, p.soil_moisture).availability;

    TrainingRow {
        timestamp: entry.timestamp,
        soil_moisture: p.soil_moisture,
        temperature: p.temperature,
        humidity: p.humidity,
        wind_speed: p.wind_speed,
        ec_salinity: p.ec_salinity,
        soil_ph: p.soil_ph,
        et0: entry.et0,
        moisture_delta_next_24h: moisture_delta_next_24h(p.soil_moisture, p.wind_speed, entry.et0),
        available_n: nutrients.nitrogen,
        available_p: nutrients.phosphorus,
        available_k: nutrients.potassium,
        mean_temperature_window: entry.disease.map(|d| d.mean_temperature_window),
        humidity_duration_hours: entry.disease.map(|d| d.humidity_duration_hours),
        temperature_range: entry.disease.map(|d| d.temperature_range),
        disease_label: entry.disease.map(|d| u8::from(disease_label(&d))),
    }
}
