//! Synthetic cold-start data
//!
//! When no field data exists the models are fitted on physics-consistent
//! synthetic rows. Humidity is anti-correlated with temperature and leaf
//! wetness follows humidity, so the disease classifier sees realistic
//! co-occurrence instead of independent noise.

use super::dataset::TrainingRow;
use super::labels::{disease_label, moisture_delta_next_24h};
use crate::physics::calculate_et0;
use crate::predictor::DiseaseFeatures;
use crate::soil::assess_nutrient_availability;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::info;

/// Rows produced by a default bootstrap
pub const DEFAULT_BOOTSTRAP_ROWS: usize = 5_000;

/// Noise on the water-demand label, moisture percentage points
const MOISTURE_LABEL_NOISE: f64 = 0.4;
/// Noise on nutrient labels, ppm
const NUTRIENT_LABEL_NOISE: f64 = 3.0;
/// Share of disease labels flipped
const DISEASE_LABEL_FLIP: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub rows: usize,
    /// Fixed seed for reproducible datasets; entropy when `None`
    pub seed: Option<u64>,
    /// Timestamp of the newest row; rows are spaced one hour apart
    pub end_timestamp: i64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_BOOTSTRAP_ROWS,
            seed: Some(42),
            end_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Generates labelled synthetic training rows
pub struct SyntheticDataGenerator {
    config: BootstrapConfig,
    rng: StdRng,
}

impl SyntheticDataGenerator {
    pub fn new(config: BootstrapConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn generate(&mut self) -> Vec<TrainingRow> {
        let rows = self.config.rows;
        let start = self.config.end_timestamp - (rows as i64 - 1).max(0) * 3600;
        let data: Vec<TrainingRow> = (0..rows)
            .map(|i| self.sample_row(start + i as i64 * 3600))
            .collect();

        info!(rows = data.len(), seed = ?self.config.seed, "Generated synthetic training data");
        data
    }

    fn gauss(&mut self, mean: f64, std: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        mean + std * z
    }

    fn sample_row(&mut self, timestamp: i64) -> TrainingRow {
        let temperature = self.gauss(27.0, 7.0).clamp(10.0, 45.0);
        let humidity = (95.0 - (temperature - 10.0) * 1.2 + self.gauss(0.0, 12.0)).clamp(20.0, 95.0);
        let wind_speed = self.gauss(12.0, 7.0).clamp(0.0, 40.0);
        let soil_moisture = self.gauss(50.0, 18.0).clamp(0.0, 100.0);
        let ec_salinity = (self.gauss(1.8, 1.0) + 0.02 * (40.0 - soil_moisture).max(0.0)).clamp(0.1, 5.0);
        let soil_ph = self.gauss(6.6, 0.9).clamp(4.0, 9.0);

        let et0 = calculate_et0(temperature, humidity, wind_speed);
        let moisture_delta = moisture_delta_next_24h(soil_moisture, wind_speed, et0)
            + self.gauss(0.0, MOISTURE_LABEL_NOISE);

        let npk = assess_nutrient_availability(soil_ph, ec_salinity, soil_moisture).availability;
        let available_n = (npk.nitrogen + self.gauss(0.0, NUTRIENT_LABEL_NOISE)).max(0.0);
        let available_p = (npk.phosphorus + self.gauss(0.0, NUTRIENT_LABEL_NOISE)).max(0.0);
        let available_k = (npk.potassium + self.gauss(0.0, NUTRIENT_LABEL_NOISE)).max(0.0);

        let disease = DiseaseFeatures {
            mean_temperature_window: temperature + self.gauss(0.0, 2.0),
            humidity_duration_hours: ((humidity - 60.0) / 35.0 * 18.0 + self.gauss(0.0, 3.0))
                .clamp(0.0, 24.0),
            temperature_range: self.gauss(8.0, 3.0).clamp(1.0, 20.0),
        };
        let mut label = disease_label(&disease);
        if self.rng.gen_bool(DISEASE_LABEL_FLIP) {
            label = !label;
        }

        TrainingRow {
            timestamp,
            soil_moisture,
            temperature,
            humidity,
            wind_speed,
            ec_salinity,
            soil_ph,
            et0,
            moisture_delta_next_24h: moisture_delta,
            available_n,
            available_p,
            available_k,
            mean_temperature_window: Some(disease.mean_temperature_window),
            humidity_duration_hours: Some(disease.humidity_duration_hours),
            temperature_range: Some(disease.temperature_range),
            disease_label: Some(u8::from(label)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(rows: usize, seed: u64) -> Vec<TrainingRow> {
        SyntheticDataGenerator::new(BootstrapConfig {
            rows,
            seed: Some(seed),
            end_timestamp: 1_700_000_000,
        })
        .generate()
    }

    #[test]
    fn test_values_within_plausible_ranges() {
        for row in generate(500, 7) {
            assert!((10.0..=45.0).contains(&row.temperature));
            assert!((20.0..=95.0).contains(&row.humidity));
            assert!((0.0..=40.0).contains(&row.wind_speed));
            assert!((0.0..=100.0).contains(&row.soil_moisture));
            assert!((0.1..=5.0).contains(&row.ec_salinity));
            assert!((4.0..=9.0).contains(&row.soil_ph));
            assert!(row.et0 >= 0.0);
            assert!(row.available_n >= 0.0);
            assert!(row.disease_sample().is_some());
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        assert_eq!(generate(50, 3), generate(50, 3));
        assert_ne!(generate(50, 3), generate(50, 4));
    }

    #[test]
    fn test_timestamps_hourly_ending_at_end() {
        let rows = generate(10, 1);
        assert_eq!(rows.last().unwrap().timestamp, 1_700_000_000);
        assert_eq!(rows[1].timestamp - rows[0].timestamp, 3600);
    }

    #[test]
    fn test_both_disease_classes_present() {
        let rows = generate(2_000, 11);
        let positives = rows.iter().filter(|r| r.disease_label == Some(1)).count();
        assert!(positives > 50);
        assert!(positives < rows.len() - 50);
    }

    #[test]
    fn test_humidity_anticorrelated_with_temperature() {
        let rows = generate(2_000, 5);
        let n = rows.len() as f64;
        let mt = rows.iter().map(|r| r.temperature).sum::<f64>() / n;
        let mh = rows.iter().map(|r| r.humidity).sum::<f64>() / n;
        let cov: f64 = rows
            .iter()
            .map(|r| (r.temperature - mt) * (r.humidity - mh))
            .sum();
        assert!(cov < 0.0);
    }
}
