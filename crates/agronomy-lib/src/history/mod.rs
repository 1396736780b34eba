//! Bounded in-memory history owned by the engine
//!
//! - Fixed-capacity ring buffer
//! - Rolling climate window for disease features
//! - Irrigation cycle log for efficiency tracking

mod climate;
mod irrigation;
mod ring;

pub use climate::{ClimateHistory, DEFAULT_HISTORY_CAPACITY};
pub use irrigation::{IrrigationLog, DEFAULT_CYCLE_CAPACITY};
pub use ring::RingBuffer;
