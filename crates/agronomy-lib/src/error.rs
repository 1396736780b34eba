//! Error types shared across the engine

use thiserror::Error;

/// Reasons a model prediction could not be produced.
///
/// The fusion engine never propagates these; it records the message in the
/// affected section of the analysis and omits the matching decision.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("models not loaded")]
    ModelsNotLoaded,

    #[error("disease model unavailable")]
    DiseaseModelUnavailable,

    #[error("non-finite input for feature '{0}'")]
    NonFiniteInput(&'static str),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Why a packet was kept out of the learning buffer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is not finite")]
    NonFinite { field: &'static str },

    #[error("field '{field}' = {value} outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Training dataset I/O errors
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty dataset")]
    Empty,
}

/// Model fitting and artifact errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("not enough rows to fit: {rows} rows, need {required}")]
    InsufficientData { rows: usize, required: usize },

    #[error("row {row} has {got} features, expected {expected}")]
    ShapeMismatch {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("normal equations are singular")]
    Singular,

    #[error("checksum mismatch for {file}: expected {expected}, found {found}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        found: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
