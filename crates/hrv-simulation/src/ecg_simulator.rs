//! Synthetic ECG: a sine-burst beat train with realistic contamination

use crate::beat_patterns::BeatPattern;
use hrv_core::{HrvError, HrvResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Contamination added on top of the beat train
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation (0.0 = no noise)
    pub gaussian_std: f64,
    /// Baseline wander amplitude
    pub baseline_wander: f64,
    /// Baseline wander frequency in Hz
    pub wander_hz: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 20.0,
            baseline_wander: 200.0,
            wander_hz: 0.2,
        }
    }
}

impl NoiseConfig {
    /// No contamination at all
    pub fn clean() -> Self {
        Self {
            gaussian_std: 0.0,
            baseline_wander: 0.0,
            wander_hz: 0.0,
        }
    }
}

/// Configuration for ECG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcgConfig {
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// Heart rate pattern
    pub pattern: BeatPattern,
    /// Peak amplitude of each beat
    pub pulse_amplitude: f64,
    /// Duration of each half-cosine beat in seconds
    pub pulse_width: f64,
    /// Time of the first beat in seconds
    pub first_beat: f64,
    /// Noise configuration
    pub noise: NoiseConfig,
    /// Power line interference frequency (50/60Hz)
    pub powerline_hz: Option<f64>,
    /// Power line interference amplitude
    pub powerline_amplitude: f64,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for EcgConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 500.0,
            pattern: BeatPattern::default(),
            pulse_amplitude: 1500.0,
            pulse_width: 0.08,
            first_beat: 1.0,
            noise: NoiseConfig::default(),
            powerline_hz: Some(50.0),
            powerline_amplitude: 100.0,
            seed: None,
        }
    }
}

impl EcgConfig {
    /// Pure beat train: no noise, wander or mains
    pub fn clean(pattern: BeatPattern) -> Self {
        Self {
            pattern,
            noise: NoiseConfig::clean(),
            powerline_hz: None,
            seed: Some(0),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> HrvResult<()> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(HrvError::InvalidSamplingRate {
                rate: self.sampling_rate,
            });
        }

        let min_rate = self.pattern.min_rate();
        if !(min_rate.is_finite() && min_rate > 0.0) {
            return Err(HrvError::Simulation {
                reason: format!("beat pattern reaches a non-positive rate ({min_rate} BPM)"),
            });
        }

        let shortest_interval = 60.0 / self.pattern.max_rate();
        if !(self.pulse_width.is_finite() && self.pulse_width > 0.0)
            || self.pulse_width >= shortest_interval
        {
            return Err(HrvError::Simulation {
                reason: format!(
                    "pulse width {}s must be positive and shorter than {}s",
                    self.pulse_width, shortest_interval
                ),
            });
        }

        if self.noise.gaussian_std.is_nan() || self.noise.gaussian_std < 0.0 {
            return Err(HrvError::Simulation {
                reason: format!("negative noise deviation {}", self.noise.gaussian_std),
            });
        }

        Ok(())
    }
}

/// ECG signal simulator
pub struct EcgSimulator {
    config: EcgConfig,
    rng: StdRng,
    normal_dist: Normal<f64>,
    sample_index: u64,
    previous_beat: Option<f64>,
    next_beat: f64,
    beats_completed: u64,
}

impl EcgSimulator {
    /// Create new ECG simulator with configuration
    pub fn new(config: EcgConfig) -> HrvResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let normal_dist = Self::noise_distribution(&config)?;

        Ok(EcgSimulator {
            next_beat: config.first_beat,
            config,
            rng,
            normal_dist,
            sample_index: 0,
            previous_beat: None,
            beats_completed: 0,
        })
    }

    fn noise_distribution(config: &EcgConfig) -> HrvResult<Normal<f64>> {
        Normal::new(0.0, config.noise.gaussian_std).map_err(|e| HrvError::Simulation {
            reason: format!("Failed to create normal distribution: {}", e),
        })
    }

    /// Generate the next `samples` samples
    pub fn generate_chunk(&mut self, samples: usize) -> Vec<f64> {
        (0..samples).map(|_| self.next_sample()).collect()
    }

    /// Generate the next `duration` seconds of signal
    pub fn generate(&mut self, duration: f64) -> Vec<f64> {
        let samples = (duration * self.config.sampling_rate).round() as usize;
        self.generate_chunk(samples)
    }

    /// Samples are stamped `n / fs` for n = 1, 2, ...
    fn next_sample(&mut self) -> f64 {
        self.sample_index += 1;
        let time = self.sample_index as f64 / self.config.sampling_rate;

        let half_width = self.config.pulse_width / 2.0;
        while time - self.next_beat >= half_width {
            self.previous_beat = Some(self.next_beat);
            self.next_beat += self.config.pattern.interval_at(self.next_beat);
            self.beats_completed += 1;
        }

        let mut value = self.pulse(time - self.next_beat);
        if let Some(previous) = self.previous_beat {
            value += self.pulse(time - previous);
        }

        value += self.add_noise(time);

        if let Some(powerline_hz) = self.config.powerline_hz {
            value += self.config.powerline_amplitude * (2.0 * PI * powerline_hz * time).sin();
        }

        value
    }

    fn pulse(&self, offset: f64) -> f64 {
        let width = self.config.pulse_width;
        if offset.abs() < width / 2.0 {
            self.config.pulse_amplitude * (PI * offset / width).cos()
        } else {
            0.0
        }
    }

    fn add_noise(&mut self, time: f64) -> f64 {
        let wander = self.config.noise.baseline_wander
            * (2.0 * PI * self.config.noise.wander_hz * time).sin();
        let gaussian = if self.config.noise.gaussian_std > 0.0 {
            self.normal_dist.sample(&mut self.rng)
        } else {
            0.0
        };
        wander + gaussian
    }

    /// Restart the beat train at time zero
    pub fn reset_time(&mut self) {
        self.sample_index = 0;
        self.previous_beat = None;
        self.next_beat = self.config.first_beat;
        self.beats_completed = 0;
    }

    /// Seconds of signal generated so far
    pub fn elapsed(&self) -> f64 {
        self.sample_index as f64 / self.config.sampling_rate
    }

    /// Beats whose whole pulse has been emitted
    pub fn beats_completed(&self) -> u64 {
        self.beats_completed
    }

    /// Get current configuration
    pub fn config(&self) -> &EcgConfig {
        &self.config
    }

    /// Update configuration; the time axis continues
    pub fn update_config(&mut self, config: EcgConfig) -> HrvResult<()> {
        config.validate()?;
        self.normal_dist = Self::noise_distribution(&config)?;
        self.config = config;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_clean_train_peaks_on_beats() {
        let mut simulator = EcgSimulator::new(EcgConfig::clean(BeatPattern::default())).unwrap();
        let signal = simulator.generate(3.5);
        assert_eq!(signal.len(), 1750);

        // Sample n is stamped n / fs, so t = 1.0 s is index 499
        assert_abs_diff_eq!(signal[499], 1500.0);
        assert_abs_diff_eq!(signal[999], 1500.0, epsilon = 1e-9);
        assert_abs_diff_eq!(signal[749], 0.0);
        assert!(signal.iter().all(|v| v.abs() <= 1500.0 + 1e-9));
        assert_eq!(simulator.beats_completed(), 3);
    }

    #[test]
    fn test_chunking_does_not_change_signal() {
        let config = EcgConfig {
            seed: Some(7),
            ..EcgConfig::default()
        };
        let whole = EcgSimulator::new(config.clone()).unwrap().generate_chunk(2000);

        let mut simulator = EcgSimulator::new(config).unwrap();
        let mut chunked = Vec::new();
        while chunked.len() < 2000 {
            let n = 37.min(2000 - chunked.len());
            chunked.extend(simulator.generate_chunk(n));
        }
        assert_eq!(whole, chunked);
    }

    #[test]
    fn test_seed_reproducibility() {
        let config = EcgConfig {
            seed: Some(42),
            ..EcgConfig::default()
        };
        let a = EcgSimulator::new(config.clone()).unwrap().generate(1.0);
        let b = EcgSimulator::new(config).unwrap().generate(1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_reset_time_restarts_train() {
        let mut simulator = EcgSimulator::new(EcgConfig::clean(BeatPattern::default())).unwrap();
        let first = simulator.generate(2.0);
        simulator.reset_time();
        assert_eq!(simulator.elapsed(), 0.0);
        assert_eq!(simulator.generate(2.0), first);
    }

    #[test]
    fn test_invalid_configs() {
        let bad_rate = EcgConfig {
            sampling_rate: 0.0,
            ..EcgConfig::default()
        };
        assert!(matches!(
            EcgSimulator::new(bad_rate),
            Err(HrvError::InvalidSamplingRate { .. })
        ));

        let wide_pulse = EcgConfig {
            pulse_width: 2.0,
            ..EcgConfig::default()
        };
        assert!(matches!(
            EcgSimulator::new(wide_pulse),
            Err(HrvError::Simulation { .. })
        ));

        let mut simulator = EcgSimulator::new(EcgConfig::default()).unwrap();
        let negative_noise = EcgConfig {
            noise: NoiseConfig {
                gaussian_std: -1.0,
                ..NoiseConfig::default()
            },
            ..EcgConfig::default()
        };
        assert!(simulator.update_config(negative_noise).is_err());
        assert_eq!(simulator.config(), &EcgConfig::default());
    }
}
