//! HRV-Core: Foundation types for the heart-rate variability pipeline
//!
//! Error type, bounded buffers and the value types passed between stages.

pub mod error;
pub mod ring_buffer;
pub mod sample_store;
pub mod signal_types;

pub use error::{HrvError, HrvResult};
pub use ring_buffer::RingBuffer;
pub use sample_store::SampleStore;
pub use signal_types::*;
