//! Heart rate from recent RR intervals

use crate::config::RateConfig;
use hrv_core::{HrvError, HrvResult, RingBuffer};

/// Averages instantaneous BPM over the most recent intervals
#[derive(Debug, Clone)]
pub struct RateEstimator {
    config: RateConfig,
}

impl RateEstimator {
    pub fn new(config: RateConfig) -> HrvResult<Self> {
        if config.window == 0 {
            return Err(hrv_core::analysis_error!("rate window must be at least 1"));
        }
        if config.history_len == 0 {
            return Err(hrv_core::analysis_error!("rate history must hold at least 1 value"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &RateConfig {
        &self.config
    }

    /// Number of trailing intervals an estimate uses
    pub fn window(&self) -> usize {
        self.config.window
    }

    /// Mean of `60 / rr` over the last `window` of `intervals`
    pub fn estimate(&self, intervals: &[f64]) -> HrvResult<f64> {
        if intervals.is_empty() {
            return Err(HrvError::InsufficientData {
                needed: 1,
                available: 0,
            });
        }

        let recent = &intervals[intervals.len().saturating_sub(self.config.window)..];
        if recent.iter().any(|&rr| !(rr.is_finite() && rr > 0.0)) {
            return Err(HrvError::NumericDegeneracy {
                reason: "non-positive RR interval",
            });
        }

        let total: f64 = recent.iter().map(|rr| 60.0 / rr).sum();
        Ok(total / recent.len() as f64)
    }
}

/// Bounded history of BPM estimates
#[derive(Debug, Clone)]
pub struct RateHistory {
    values: RingBuffer<f64>,
}

impl RateHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: RingBuffer::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, bpm: f64) {
        self.values.push(bpm);
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.to_vec()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn estimator() -> RateEstimator {
        RateEstimator::new(RateConfig::default()).unwrap()
    }

    #[test]
    fn test_constant_intervals_give_60_bpm() {
        let bpm = estimator().estimate(&[1.0; 8]).unwrap();
        assert_relative_eq!(bpm, 60.0);
    }

    #[test]
    fn test_uses_only_recent_window() {
        // The two leading 0.5 s intervals fall outside the window of 5
        let intervals = [0.5, 0.5, 1.0, 1.0, 0.75, 0.75, 1.5];
        let bpm = estimator().estimate(&intervals).unwrap();
        let expected = (60.0 + 60.0 + 80.0 + 80.0 + 40.0) / 5.0;
        assert_relative_eq!(bpm, expected);
    }

    #[test]
    fn test_fewer_intervals_than_window() {
        let bpm = estimator().estimate(&[0.5, 1.0]).unwrap();
        assert_relative_eq!(bpm, 90.0);
    }

    #[test]
    fn test_empty_and_degenerate_input() {
        assert!(matches!(
            estimator().estimate(&[]),
            Err(HrvError::InsufficientData { .. })
        ));
        assert!(matches!(
            estimator().estimate(&[1.0, 0.0]),
            Err(HrvError::NumericDegeneracy { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_window() {
        let config = RateConfig {
            window: 0,
            ..RateConfig::default()
        };
        assert!(RateEstimator::new(config).is_err());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = RateHistory::new(3);
        assert!(history.latest().is_none());
        for bpm in [60.0, 61.0, 62.0, 63.0] {
            history.push(bpm);
        }
        assert_eq!(history.values(), vec![61.0, 62.0, 63.0]);
        assert_eq!(history.latest(), Some(63.0));
        history.clear();
        assert!(history.is_empty());
    }
}
