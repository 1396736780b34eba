//! CLI subcommands

pub mod analyze;
pub mod models;
pub mod physics;

/// Serde name of a unit enum, for table cells
pub(crate) fn label<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}
