//! Configuration for the analysis pipeline

use hrv_core::{HrvError, HrvResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sampling rate of the incoming waveform (Hz)
    pub sampling_rate: f64,
    /// Length of the filtered-sample window kept in memory (seconds)
    pub window_seconds: f64,
    /// Filter cascade parameters
    pub filters: FilterSettings,
    /// Beat detection thresholds
    pub detection: DetectionConfig,
    /// Beats-per-minute smoothing
    pub rate: RateConfig,
    /// Variability spectrum settings
    pub variability: VariabilityConfig,
    /// Coherence scoring bands and display curve
    pub coherence: CoherenceConfig,
    /// Periods of the background tasks
    pub schedule: ScheduleConfig,
}

/// Parameters of the three filter stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Baseline-wander removal
    pub highpass: ButterworthParams,
    /// High-frequency noise removal
    pub lowpass: ButterworthParams,
    /// Powerline interference removal
    pub notch: NotchParams,
    /// How filter memory is seeded after (re)configuration
    pub initial_state: InitialState,
}

/// Butterworth stage parameters.
///
/// Only the cutoff is required in a JSON document; a missing order falls
/// back to 4 and a missing attenuation to 3 dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ButterworthParams {
    /// Filter order (1..=10)
    #[serde(default = "default_order")]
    pub order: usize,
    /// -3 dB cutoff frequency (Hz)
    pub cutoff_hz: f64,
    /// Passband ripple (dB); a Butterworth response is maximally flat so
    /// this is validated but does not shape the design
    #[serde(default)]
    pub passband_ripple_db: Option<f64>,
    /// Stopband attenuation (dB); validated, not used by the design
    #[serde(default = "default_attenuation")]
    pub stopband_attenuation_db: Option<f64>,
}

fn default_order() -> usize {
    4
}

fn default_attenuation() -> Option<f64> {
    Some(3.0)
}

/// Notch stage parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotchParams {
    /// Mains frequency to reject (Hz)
    pub frequency_hz: f64,
    /// Quality factor; -3 dB bandwidth is `frequency_hz / quality`
    pub quality: f64,
}

/// Seed for filter memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialState {
    /// Steady state reached after a unit step input
    StepResponse,
    /// All-zero memory
    Zero,
}

/// Peak-finding thresholds and beat history sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum peak prominence (signal units)
    pub prominence: f64,
    /// Minimum peak height (signal units)
    pub height: Option<f64>,
    /// Minimum peak width at half prominence (samples)
    pub min_width: f64,
    /// Maximum peak width at half prominence (samples)
    pub max_width: f64,
    /// Minimum horizontal distance between peaks (samples)
    pub distance: Option<usize>,
    /// Samples closer than this to the last beat are ignored (seconds)
    pub refractory_seconds: f64,
    /// Number of beats kept in history
    pub history_len: usize,
}

/// Rate estimator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Number of most recent RR intervals averaged per estimate
    pub window: usize,
    /// Number of BPM values kept in history
    pub history_len: usize,
}

/// Variability spectrum settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariabilityConfig {
    /// Minimum RR intervals before a spectrum is computed
    pub min_intervals: usize,
    /// Uniform resampling rate of the instantaneous rate (Hz)
    pub evaluation_rate: f64,
    /// Degree of the detrending polynomial
    pub detrend_degree: usize,
    /// Transform length as a multiple of the resampled series length
    pub padding_factor: usize,
}

/// Frequency band with exclusive edges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyBand {
    pub const fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// Strict containment, matching how the bands are masked
    pub fn contains(&self, frequency: f64) -> bool {
        frequency > self.low_hz && frequency < self.high_hz
    }
}

/// Coherence scoring settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoherenceConfig {
    /// Band searched for the dominant peak
    pub resonance_band: FrequencyBand,
    /// Half width of the integration window around the peak (Hz)
    pub peak_half_width_hz: f64,
    /// Band over which total power is integrated
    pub total_band: FrequencyBand,
    /// Display curve spans `[-curve_extent, curve_extent]`
    pub curve_extent: f64,
    /// Number of display curve points
    pub curve_points: usize,
}

/// Background task periods in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub detection_period_ms: u64,
    pub rate_period_ms: u64,
    pub variability_period_ms: u64,
    pub coherence_period_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 500.0,
            window_seconds: 5.0,
            filters: FilterSettings::default(),
            detection: DetectionConfig::default(),
            rate: RateConfig::default(),
            variability: VariabilityConfig::default(),
            coherence: CoherenceConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            highpass: ButterworthParams {
                order: 3,
                cutoff_hz: 0.67,
                passband_ripple_db: Some(0.5),
                stopband_attenuation_db: Some(3.0),
            },
            lowpass: ButterworthParams {
                order: 4,
                cutoff_hz: 150.0,
                passband_ripple_db: None,
                stopband_attenuation_db: Some(3.0),
            },
            notch: NotchParams::default(),
            initial_state: InitialState::StepResponse,
        }
    }
}

impl Default for NotchParams {
    fn default() -> Self {
        Self {
            frequency_hz: 50.0,
            quality: 10.0,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            prominence: 1000.0,
            height: Some(500.0),
            min_width: 10.0,
            max_width: 100.0,
            distance: Some(200),
            refractory_seconds: 0.2,
            history_len: 500,
        }
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            window: 5,
            history_len: 500,
        }
    }
}

impl Default for VariabilityConfig {
    fn default() -> Self {
        Self {
            min_intervals: 10,
            evaluation_rate: 1.0,
            detrend_degree: 3,
            padding_factor: 20,
        }
    }
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            resonance_band: FrequencyBand::new(0.04, 0.26),
            peak_half_width_hz: 0.015,
            total_band: FrequencyBand::new(0.0033, 0.4),
            curve_extent: 4.0,
            curve_points: 1000,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            detection_period_ms: 1000,
            rate_period_ms: 1000,
            variability_period_ms: 1000,
            coherence_period_ms: 1000,
        }
    }
}

impl ScheduleConfig {
    pub fn detection_period(&self) -> Duration {
        Duration::from_millis(self.detection_period_ms)
    }

    pub fn rate_period(&self) -> Duration {
        Duration::from_millis(self.rate_period_ms)
    }

    pub fn variability_period(&self) -> Duration {
        Duration::from_millis(self.variability_period_ms)
    }

    pub fn coherence_period(&self) -> Duration {
        Duration::from_millis(self.coherence_period_ms)
    }
}

impl ButterworthParams {
    /// Check the parameters against a sampling rate
    pub fn validate(&self, stage: &'static str, sampling_rate: f64) -> HrvResult<()> {
        let nyquist = sampling_rate / 2.0;

        if self.order == 0 || self.order > 10 {
            return Err(HrvError::InvalidFilterConfig {
                stage,
                reason: format!("order {} outside supported range 1-10", self.order),
            });
        }

        if !self.cutoff_hz.is_finite() || self.cutoff_hz <= 0.0 || self.cutoff_hz >= nyquist {
            return Err(HrvError::InvalidFilterConfig {
                stage,
                reason: format!(
                    "cutoff {}Hz must lie strictly between 0 and Nyquist {}Hz",
                    self.cutoff_hz, nyquist
                ),
            });
        }

        for (name, value) in [
            ("passband ripple", self.passband_ripple_db),
            ("stopband attenuation", self.stopband_attenuation_db),
        ] {
            if let Some(db) = value {
                if !db.is_finite() || db < 0.0 {
                    return Err(HrvError::InvalidFilterConfig {
                        stage,
                        reason: format!("{} must be a non-negative dB value, got {}", name, db),
                    });
                }
            }
        }

        Ok(())
    }
}

impl NotchParams {
    pub fn validate(&self, sampling_rate: f64) -> HrvResult<()> {
        let nyquist = sampling_rate / 2.0;

        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 || self.frequency_hz >= nyquist {
            return Err(HrvError::InvalidFilterConfig {
                stage: "notch",
                reason: format!(
                    "frequency {}Hz must lie strictly between 0 and Nyquist {}Hz",
                    self.frequency_hz, nyquist
                ),
            });
        }

        if !self.quality.is_finite() || self.quality <= 0.0 {
            return Err(HrvError::InvalidFilterConfig {
                stage: "notch",
                reason: format!("quality factor must be positive, got {}", self.quality),
            });
        }

        Ok(())
    }
}

impl FilterSettings {
    pub fn validate(&self, sampling_rate: f64) -> HrvResult<()> {
        self.highpass.validate("highpass", sampling_rate)?;
        self.lowpass.validate("lowpass", sampling_rate)?;
        self.notch.validate(sampling_rate)
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> HrvResult<()> {
        let invalid = |reason: String| Err(HrvError::InvalidDetectionConfig { reason });

        if !self.prominence.is_finite() || self.prominence < 0.0 {
            return invalid(format!("prominence must be non-negative, got {}", self.prominence));
        }
        if let Some(height) = self.height {
            if !height.is_finite() {
                return invalid(format!("height must be finite, got {}", height));
            }
        }
        if !(self.min_width >= 0.0 && self.min_width <= self.max_width) {
            return invalid(format!(
                "width range [{}, {}] is empty or negative",
                self.min_width, self.max_width
            ));
        }
        if self.distance == Some(0) {
            return invalid("distance must be at least one sample".to_string());
        }
        if !self.refractory_seconds.is_finite() || self.refractory_seconds < 0.0 {
            return invalid(format!(
                "refractory gap must be non-negative, got {}s",
                self.refractory_seconds
            ));
        }
        if self.history_len < 2 {
            return invalid("beat history must hold at least two beats".to_string());
        }

        Ok(())
    }
}

impl VariabilityConfig {
    pub fn validate(&self) -> HrvResult<()> {
        if self.min_intervals < 2 {
            return Err(hrv_core::analysis_error!(
                "variability needs at least 2 intervals, got {}",
                self.min_intervals
            ));
        }
        if !self.evaluation_rate.is_finite() || self.evaluation_rate <= 0.0 {
            return Err(hrv_core::analysis_error!(
                "evaluation rate must be positive, got {}Hz",
                self.evaluation_rate
            ));
        }
        if self.detrend_degree > 5 {
            return Err(hrv_core::analysis_error!(
                "detrend degree {} is above the supported maximum of 5",
                self.detrend_degree
            ));
        }
        if self.padding_factor == 0 {
            return Err(hrv_core::analysis_error!("padding factor must be at least 1"));
        }
        Ok(())
    }
}

impl CoherenceConfig {
    pub fn validate(&self) -> HrvResult<()> {
        for (name, band) in [("resonance", self.resonance_band), ("total", self.total_band)] {
            if !(band.low_hz >= 0.0 && band.low_hz < band.high_hz) {
                return Err(hrv_core::analysis_error!(
                    "{} band [{}, {}]Hz is empty",
                    name,
                    band.low_hz,
                    band.high_hz
                ));
            }
        }
        if !(self.peak_half_width_hz > 0.0) {
            return Err(hrv_core::analysis_error!(
                "peak half width must be positive, got {}Hz",
                self.peak_half_width_hz
            ));
        }
        if !(self.curve_extent > 0.0) || self.curve_points < 2 {
            return Err(hrv_core::analysis_error!(
                "display curve needs a positive extent and at least 2 points"
            ));
        }
        Ok(())
    }
}

impl AnalysisConfig {
    /// Default configuration for 60 Hz mains regions
    pub fn mains_60hz() -> Self {
        let mut config = Self::default();
        config.filters.notch.frequency_hz = 60.0;
        config
    }

    /// Validate entire configuration
    pub fn validate(&self) -> HrvResult<()> {
        if !self.sampling_rate.is_finite() || self.sampling_rate <= 0.0 {
            return Err(HrvError::InvalidSamplingRate { rate: self.sampling_rate });
        }
        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(hrv_core::analysis_error!(
                "sample window must be positive, got {}s",
                self.window_seconds
            ));
        }

        self.filters.validate(self.sampling_rate)?;
        self.detection.validate()?;

        if self.rate.window == 0 || self.rate.history_len == 0 {
            return Err(hrv_core::analysis_error!("rate window and history must be non-zero"));
        }

        self.variability.validate()?;
        self.coherence.validate()?;

        let schedule = &self.schedule;
        if [
            schedule.detection_period_ms,
            schedule.rate_period_ms,
            schedule.variability_period_ms,
            schedule.coherence_period_ms,
        ]
        .contains(&0)
        {
            return Err(hrv_core::analysis_error!("task periods must be non-zero"));
        }

        Ok(())
    }

    /// Number of samples held by the sample store
    pub fn window_samples(&self) -> usize {
        (self.sampling_rate * self.window_seconds).round() as usize
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> HrvResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| HrvError::ConfigIo {
            reason: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import and validate configuration from JSON
    pub fn from_json_str(json: &str) -> HrvResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| HrvError::ConfigIo {
            reason: format!("Failed to deserialize configuration: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> HrvResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| HrvError::ConfigIo {
            reason: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&json)
    }
}
