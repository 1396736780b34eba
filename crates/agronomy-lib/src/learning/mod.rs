//! Continuous learning pipeline
//!
//! - Plausibility validation of live packets
//! - Bounded learning buffer feeding the retrainer
//! - Physics-derived labelling shared by live and synthetic data
//! - CSV training dataset with a row cap
//! - Synthetic cold-start generator

mod bootstrap;
mod buffer;
mod dataset;
mod labels;
mod validation;

pub use bootstrap::{BootstrapConfig, SyntheticDataGenerator, DEFAULT_BOOTSTRAP_ROWS};
pub use buffer::{LearningBuffer, LearningBufferStats, LearningEntry, DEFAULT_LEARNING_CAPACITY};
pub use dataset::{TrainingDataset, TrainingRow, MAX_DATASET_ROWS};
pub use labels::{
    disease_label, label_batch, label_entry, moisture_delta_next_24h, observed_moisture_delta_24h,
};
pub use validation::{
    validate_packet, ValidatedPacket, EC_SALINITY_RANGE, HUMIDITY_RANGE, SOIL_MOISTURE_RANGE,
    SOIL_PH_RANGE, TEMPERATURE_RANGE, WIND_SPEED_RANGE,
};
