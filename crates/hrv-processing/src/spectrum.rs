//! Heart rate variability power spectrum
//!
//! The instantaneous rate `1 / RR` (RR in samples) is linearly interpolated
//! between beats, resampled on a uniform grid at the evaluation rate,
//! detrended with a low-degree polynomial, Hann windowed, zero padded and
//! transformed into a one-sided periodogram.
//!
//! With the defaults (1 Hz evaluation, padding factor 20) a series of `n`
//! resampled points gives bins spaced `1 / (20 n)` Hz from 0 to 0.5 Hz.

use crate::config::VariabilityConfig;
use hrv_core::{HrvError, HrvResult, Spectrum};
use nalgebra::{DMatrix, DVector};
use realfft::RealFftPlanner;
use std::fmt;
use std::f64::consts::PI;

pub struct VariabilityAnalyzer {
    config: VariabilityConfig,
    planner: RealFftPlanner<f64>,
}

impl fmt::Debug for VariabilityAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariabilityAnalyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VariabilityAnalyzer {
    pub fn new(config: VariabilityConfig) -> HrvResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            planner: RealFftPlanner::new(),
        })
    }

    pub fn config(&self) -> &VariabilityConfig {
        &self.config
    }

    /// Compute the spectrum from RR intervals (seconds) and the time of the
    /// beat opening each interval.
    pub fn analyze(
        &mut self,
        beat_times: &[f64],
        intervals: &[f64],
        sampling_rate: f64,
    ) -> HrvResult<Spectrum> {
        if intervals.len() < self.config.min_intervals {
            return Err(HrvError::InsufficientData {
                needed: self.config.min_intervals,
                available: intervals.len(),
            });
        }
        if beat_times.len() != intervals.len() {
            return Err(hrv_core::analysis_error!(
                "{} beat times for {} intervals",
                beat_times.len(),
                intervals.len()
            ));
        }
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(HrvError::InvalidSamplingRate {
                rate: sampling_rate,
            });
        }
        if intervals.iter().any(|&rr| !(rr.is_finite() && rr > 0.0)) {
            return Err(HrvError::NumericDegeneracy {
                reason: "non-positive RR interval",
            });
        }

        let rate: Vec<f64> = intervals
            .iter()
            .map(|rr| 1.0 / (rr * sampling_rate))
            .collect();

        let first = beat_times[0];
        let last = beat_times[beat_times.len() - 1];
        let grid = uniform_grid(first, last, self.config.evaluation_rate);

        let needed = self.config.detrend_degree + 2;
        if grid.len() < needed {
            return Err(HrvError::InsufficientData {
                needed,
                available: grid.len(),
            });
        }

        let resampled = interpolate_linear(beat_times, &rate, &grid);
        let trend = polynomial_trend(&grid, &resampled, self.config.detrend_degree)?;

        let window = hann_window(grid.len());
        let mut padded = vec![0.0; grid.len() * self.config.padding_factor];
        for (slot, ((value, fit), w)) in padded
            .iter_mut()
            .zip(resampled.iter().zip(&trend).zip(&window))
        {
            *slot = (value - fit) * w;
        }

        self.periodogram(padded, self.config.evaluation_rate)
    }

    /// One-sided periodogram of an already windowed signal.
    ///
    /// Power is `|X|^2 / fs`; every bin except DC (and Nyquist for even
    /// lengths) is doubled.
    pub fn periodogram(&mut self, mut signal: Vec<f64>, fs: f64) -> HrvResult<Spectrum> {
        let n = signal.len();
        if n == 0 {
            return Err(HrvError::InsufficientData {
                needed: 1,
                available: 0,
            });
        }

        let fft = self.planner.plan_fft_forward(n);
        let mut output = fft.make_output_vec();
        fft.process(&mut signal, &mut output)
            .map_err(|_| HrvError::NumericDegeneracy {
                reason: "real FFT length mismatch",
            })?;

        let mut powers: Vec<f64> = output.iter().map(|c| c.norm_sqr() / fs).collect();
        let doubled_end = if n % 2 == 0 { powers.len() - 1 } else { powers.len() };
        for p in powers.iter_mut().take(doubled_end).skip(1) {
            *p *= 2.0;
        }

        let frequencies = (0..powers.len())
            .map(|k| k as f64 * fs / n as f64)
            .collect();

        Ok(Spectrum {
            frequencies,
            powers,
        })
    }
}

/// Points `start + i / rate` strictly below `stop`
fn uniform_grid(start: f64, stop: f64, rate: f64) -> Vec<f64> {
    if stop <= start || !(stop - start).is_finite() {
        return Vec::new();
    }
    let count = ((stop - start) * rate).ceil() as usize;
    (0..count).map(|i| start + i as f64 / rate).collect()
}

/// Piecewise linear interpolation, clamped at both ends.
/// `xs` must be strictly increasing.
fn interpolate_linear(xs: &[f64], ys: &[f64], at: &[f64]) -> Vec<f64> {
    at.iter()
        .map(|&t| {
            let upper = xs.partition_point(|&x| x <= t);
            if upper == 0 {
                ys[0]
            } else if upper >= xs.len() {
                ys[ys.len() - 1]
            } else {
                let (x0, x1) = (xs[upper - 1], xs[upper]);
                let (y0, y1) = (ys[upper - 1], ys[upper]);
                y0 + (y1 - y0) * (t - x0) / (x1 - x0)
            }
        })
        .collect()
}

/// Least-squares polynomial fit of `y` over `x`, evaluated at `x`.
///
/// `x` is centred and scaled to [-1, 1] before building the Vandermonde
/// matrix to keep it well conditioned for second-scale timestamps.
fn polynomial_trend(x: &[f64], y: &[f64], degree: usize) -> HrvResult<Vec<f64>> {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let spread = x.iter().map(|v| (v - mean).abs()).fold(0.0, f64::max);
    let scale = if spread > 0.0 { spread } else { 1.0 };
    let u: Vec<f64> = x.iter().map(|v| (v - mean) / scale).collect();

    let columns: Vec<DVector<f64>> = (0..=degree as i32)
        .map(|k| DVector::from_iterator(u.len(), u.iter().map(|v| v.powi(k))))
        .collect();
    let vandermonde = DMatrix::from_columns(&columns);
    let target = DVector::from_column_slice(y);

    let fit = lstsq::lstsq(&vandermonde, &target, f64::EPSILON).map_err(|_| {
        HrvError::NumericDegeneracy {
            reason: "singular detrending fit",
        }
    })?;

    let trend = vandermonde * fit.solution;
    if trend.iter().any(|v| !v.is_finite()) {
        return Err(HrvError::NumericDegeneracy {
            reason: "non-finite detrending fit",
        });
    }
    Ok(trend.iter().copied().collect())
}

/// Symmetric Hann window scaled to unit Euclidean norm
fn hann_window(len: usize) -> Vec<f64> {
    if len <= 1 {
        return vec![1.0; len];
    }
    let denominator = (len - 1) as f64;
    let raw: Vec<f64> = (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denominator).cos())
        .collect();
    let norm = raw.iter().map(|w| w * w).sum::<f64>().sqrt();
    raw.into_iter().map(|w| w / norm).collect()
}
