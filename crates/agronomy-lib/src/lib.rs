//! Field agronomy decision and safety-interlock engine
//!
//! This crate provides the core functionality for:
//! - Physical models (FAO-56 ET0, leaching, wind safety, leaf wetness)
//! - Rule-based soil chemistry and the Soil Stress Index
//! - Soft-sensor models with bootstrap, continuous learning and retraining
//! - Decision fusion with hard safety overrides
//! - Health checks and observability

pub mod engine;
pub mod error;
pub mod health;
pub mod history;
pub mod learning;
pub mod models;
pub mod observability;
pub mod physics;
pub mod predictor;
pub mod soil;

pub use engine::{AgronomyEngine, AnalysisResult, EngineConfig};
pub use error::{DatasetError, ModelError, PredictionError, ValidationError};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ModelSummary,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use predictor::{MlConfig, MlManager};
