//! HRV-Processing: Signal conditioning and heart rate variability analysis
//!
//! Stateful filtering of the raw ECG, beat detection, rate estimation,
//! the variability spectrum and the coherence score built on it.

pub mod beats;
pub mod coherence;
pub mod config;
pub mod filters;
pub mod peaks;
pub mod rate;
pub mod spectrum;

pub use beats::{BeatHistory, PeakDetector};
pub use coherence::CoherenceScorer;
pub use config::{
    AnalysisConfig, ButterworthParams, CoherenceConfig, DetectionConfig, FilterSettings,
    FrequencyBand, InitialState, NotchParams, RateConfig, ScheduleConfig, VariabilityConfig,
};
pub use filters::{ButterworthFilter, FilterStage, FilterType, NotchFilter, SignalFilter};
pub use peaks::{find_peaks, Peak, PeakCriteria};
pub use rate::{RateEstimator, RateHistory};
pub use spectrum::VariabilityAnalyzer;
