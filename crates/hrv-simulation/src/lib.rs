//! HRV-Simulation: Synthetic ECG generation and streaming
//!
//! Provides a deterministic beat train with configurable contamination for
//! testing and for driving the monitor without hardware.

pub mod beat_patterns;
pub mod ecg_simulator;
pub mod real_time_stream;

pub use beat_patterns::*;
pub use ecg_simulator::*;
pub use real_time_stream::*;
