//! Irrigation cycle log built from pump events

use super::RingBuffer;
use crate::models::{IrrigationCycle, PumpEvent};
use tracing::debug;

/// Number of completed cycles kept for the efficiency average
pub const DEFAULT_CYCLE_CAPACITY: usize = 10;

/// Pairs PUMP_ON/PUMP_OFF events into cycles
#[derive(Debug, Clone)]
pub struct IrrigationLog {
    /// (timestamp, soil moisture) of the open PUMP_ON
    pending_start: Option<(i64, f64)>,
    cycles: RingBuffer<IrrigationCycle>,
}

impl Default for IrrigationLog {
    fn default() -> Self {
        Self::new(DEFAULT_CYCLE_CAPACITY)
    }
}

impl IrrigationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending_start: None,
            cycles: RingBuffer::new(capacity),
        }
    }

    /// Apply a pump event, returning the cycle it completed (if any)
    pub fn record(&mut self, event: PumpEvent) -> Option<IrrigationCycle> {
        match event {
            PumpEvent::PumpOn {
                timestamp,
                soil_moisture,
            } => {
                if self.pending_start.is_some() {
                    debug!(timestamp, "PUMP_ON while a cycle is open, restarting cycle");
                }
                self.pending_start = Some((timestamp, soil_moisture));
                None
            }
            PumpEvent::PumpOff {
                timestamp,
                soil_moisture,
            } => {
                let (start, start_moisture) = match self.pending_start.take() {
                    Some(s) => s,
                    None => {
                        debug!(timestamp, "PUMP_OFF without matching PUMP_ON, ignoring");
                        return None;
                    }
                };

                let runtime_minutes = (timestamp - start) as f64 / 60.0;
                if runtime_minutes <= 0.0 {
                    debug!(start, timestamp, "Non-positive pump runtime, ignoring cycle");
                    return None;
                }

                let moisture_gain = soil_moisture - start_moisture;
                let cycle = IrrigationCycle {
                    timestamp: start,
                    runtime_minutes,
                    moisture_gain,
                    efficiency: moisture_gain / runtime_minutes,
                };
                self.cycles.push(cycle);
                Some(cycle)
            }
        }
    }

    pub fn is_pump_running(&self) -> bool {
        self.pending_start.is_some()
    }

    pub fn cycles(&self) -> Vec<IrrigationCycle> {
        self.cycles.iter().copied().collect()
    }

    /// Mean efficiency (moisture points per minute) over the kept cycles
    pub fn average_efficiency(&self) -> Option<f64> {
        if self.cycles.is_empty() {
            return None;
        }
        let total: f64 = self.cycles.iter().map(|c| c.efficiency).sum();
        Some(total / self.cycles.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on(timestamp: i64, soil_moisture: f64) -> PumpEvent {
        PumpEvent::PumpOn {
            timestamp,
            soil_moisture,
        }
    }

    fn off(timestamp: i64, soil_moisture: f64) -> PumpEvent {
        PumpEvent::PumpOff {
            timestamp,
            soil_moisture,
        }
    }

    #[test]
    fn test_paired_events_make_a_cycle() {
        let mut log = IrrigationLog::default();
        assert!(log.record(on(0, 30.0)).is_none());
        assert!(log.is_pump_running());

        let cycle = log.record(off(600, 40.0)).unwrap();
        assert_eq!(cycle.runtime_minutes, 10.0);
        assert_eq!(cycle.moisture_gain, 10.0);
        assert_eq!(cycle.efficiency, 1.0);
        assert!(!log.is_pump_running());
    }

    #[test]
    fn test_unpaired_off_is_ignored() {
        let mut log = IrrigationLog::default();
        assert!(log.record(off(600, 40.0)).is_none());
        assert!(log.average_efficiency().is_none());
    }

    #[test]
    fn test_zero_runtime_is_ignored() {
        let mut log = IrrigationLog::default();
        log.record(on(100, 30.0));
        assert!(log.record(off(100, 35.0)).is_none());
    }

    #[test]
    fn test_keeps_last_ten_cycles() {
        let mut log = IrrigationLog::default();
        for i in 0..15i64 {
            let start = i * 10_000;
            log.record(on(start, 30.0));
            // Cycle i gains i points over 10 minutes
            log.record(off(start + 600, 30.0 + i as f64));
        }
        let cycles = log.cycles();
        assert_eq!(cycles.len(), 10);
        assert_eq!(cycles[0].timestamp, 50_000);

        // Efficiencies 0.5..=1.4 average to 0.95
        let avg = log.average_efficiency().unwrap();
        assert!((avg - 0.95).abs() < 1e-9, "avg was {}", avg);
    }
}
