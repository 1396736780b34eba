//! Rolling climate window
//!
//! Holds the most recent temperature/humidity samples used to derive
//! disease-pressure features.

use super::RingBuffer;
use crate::models::HistoryEntry;

/// Default window length: one hour at one sample per minute
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

#[derive(Debug, Clone)]
pub struct ClimateHistory {
    entries: RingBuffer<HistoryEntry>,
}

impl Default for ClimateHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ClimateHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RingBuffer::new(capacity),
        }
    }

    pub fn record(&mut self, timestamp: i64, temperature: f64, humidity: f64) {
        self.entries.push(HistoryEntry {
            timestamp,
            temperature,
            humidity,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Entries oldest first
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> + '_ {
        self.entries.iter()
    }

    /// Temperatures oldest first
    pub fn temperatures(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.temperature).collect()
    }

    /// Humidity readings oldest first (most recent last)
    pub fn humidity_series(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.humidity).collect()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.newest()
    }
}
