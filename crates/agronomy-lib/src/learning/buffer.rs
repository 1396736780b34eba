//! In-memory learning buffer
//!
//! Holds validated live observations until enough have accumulated for a
//! retrain:
//! - Fixed capacity ring (default 100 entries), oldest evicted first
//! - `push` reports when the buffer has just become full
//! - `drain` hands the batch to the retrainer and empties the buffer

use super::validation::ValidatedPacket;
use crate::history::RingBuffer;
use crate::predictor::DiseaseFeatures;
use serde::Serialize;

/// Entries needed before a retrain is triggered
pub const DEFAULT_LEARNING_CAPACITY: usize = 100;

/// A validated observation with the derived values needed for labelling
#[derive(Debug, Clone, PartialEq)]
pub struct LearningEntry {
    pub timestamp: i64,
    pub packet: ValidatedPacket,
    pub et0: f64,
    pub disease: Option<DiseaseFeatures>,
}

/// Bounded buffer feeding the retrainer
#[derive(Debug)]
pub struct LearningBuffer {
    entries: RingBuffer<LearningEntry>,
    total_pushed: u64,
    total_evicted: u64,
}

impl Default for LearningBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LEARNING_CAPACITY)
    }
}

impl LearningBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RingBuffer::new(capacity),
            total_pushed: 0,
            total_evicted: 0,
        }
    }

    /// Add an entry. Returns `true` when the buffer is full after the push.
    pub fn push(&mut self, entry: LearningEntry) -> bool {
        if self.entries.push(entry).is_some() {
            self.total_evicted += 1;
        }
        self.total_pushed += 1;
        self.entries.is_full()
    }

    /// Remove and return all entries, oldest first
    pub fn drain(&mut self) -> Vec<LearningEntry> {
        self.entries.drain()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn stats(&self) -> LearningBufferStats {
        LearningBufferStats {
            entries: self.entries.len(),
            capacity: self.entries.capacity(),
            total_pushed: self.total_pushed,
            total_evicted: self.total_evicted,
            oldest_timestamp: self.entries.oldest().map(|e| e.timestamp),
            newest_timestamp: self.entries.newest().map(|e| e.timestamp),
        }
    }
}

/// Buffer statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningBufferStats {
    pub entries: usize,
    pub capacity: usize,
    pub total_pushed: u64,
    pub total_evicted: u64,
    pub oldest_timestamp: Option<i64>,
    pub newest_timestamp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: i64) -> LearningEntry {
        LearningEntry {
            timestamp,
            packet: ValidatedPacket {
                soil_moisture: 45.0,
                temperature: 25.0,
                humidity: 60.0,
                wind_speed: 10.0,
                ec_salinity: 1.2,
                soil_ph: 6.5,
            },
            et0: 5.0,
            disease: None,
        }
    }

    #[test]
    fn test_push_signals_full() {
        let mut buffer = LearningBuffer::new(3);
        assert!(!buffer.push(entry(1)));
        assert!(!buffer.push(entry(2)));
        assert!(buffer.push(entry(3)));
        assert!(buffer.is_full());
    }

    #[test]
    fn test_drain_empties() {
        let mut buffer = LearningBuffer::new(3);
        for i in 0..3 {
            buffer.push(entry(i));
        }
        let batch = buffer.drain();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].timestamp, 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut buffer = LearningBuffer::new(2);
        for i in 0..5 {
            buffer.push(entry(i));
        }
        let stats = buffer.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_pushed, 5);
        assert_eq!(stats.total_evicted, 3);
        assert_eq!(stats.oldest_timestamp, Some(3));
        assert_eq!(stats.newest_timestamp, Some(4));
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(LearningBuffer::default().capacity(), DEFAULT_LEARNING_CAPACITY);
    }
}
