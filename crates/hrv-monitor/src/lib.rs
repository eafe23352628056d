//! HRV-Monitor: Streaming heart rate variability runtime
//!
//! Owns the shared pipeline state, the append path and the four periodic
//! analysis tasks started and stopped with each session.

pub mod monitor;
pub mod state;
pub mod tasks;

pub use monitor::HrvMonitor;
pub use state::{CycleCounts, MonitorStats};
