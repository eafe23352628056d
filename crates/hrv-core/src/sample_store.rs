//! SampleStore: bounded, time-aligned buffer of filtered samples

use crate::error::{HrvError, HrvResult};
use crate::ring_buffer::RingBuffer;
use crate::signal_types::SampleSnapshot;

/// Amplitude paired with its synthetic timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
struct TimedSample {
    time: f64,
    value: f64,
}

/// Fixed-capacity window of the most recent filtered samples.
///
/// Values and timestamps live in a single ring buffer of pairs, so the two
/// sequences can never drift out of alignment. Timestamps are derived from a
/// sample counter (`n / sampling_rate`), which keeps the spacing exact no
/// matter how many samples have been appended.
#[derive(Debug, Clone)]
pub struct SampleStore {
    samples: RingBuffer<TimedSample>,
    sampling_rate: f64,
    samples_seen: u64,
}

impl SampleStore {
    /// Create a store holding `sampling_rate * window_seconds` samples
    pub fn new(sampling_rate: f64, window_seconds: f64) -> HrvResult<Self> {
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(HrvError::InvalidSamplingRate { rate: sampling_rate });
        }
        if !window_seconds.is_finite() || window_seconds <= 0.0 {
            return Err(HrvError::InvalidAnalysisConfig {
                reason: format!("window length must be positive, got {}s", window_seconds),
            });
        }

        let capacity = (sampling_rate * window_seconds).round() as usize;
        Ok(Self::with_capacity(sampling_rate, capacity))
    }

    /// Create a store with an explicit sample capacity
    pub fn with_capacity(sampling_rate: f64, capacity: usize) -> Self {
        Self {
            samples: RingBuffer::with_capacity(capacity),
            sampling_rate,
            samples_seen: 0,
        }
    }

    /// Append a chunk of filtered samples, evicting the oldest beyond capacity.
    ///
    /// Each sample advances the time cursor by exactly `1 / sampling_rate`;
    /// the first sample ever appended is stamped `1 / sampling_rate`.
    pub fn append(&mut self, chunk: &[f64]) -> usize {
        let mut evicted = 0;
        for &value in chunk {
            self.samples_seen += 1;
            let time = self.samples_seen as f64 / self.sampling_rate;
            if self.samples.push(TimedSample { time, value }).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    /// Copy out the current contents
    pub fn snapshot(&self) -> SampleSnapshot {
        let (times, values) = self.samples.iter().map(|s| (s.time, s.value)).unzip();
        SampleSnapshot { values, times }
    }

    /// Drop all samples and rewind the time cursor
    pub fn reset(&mut self) {
        self.samples.clear();
        self.samples_seen = 0;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Total samples appended since the last reset
    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    /// Current time cursor in seconds
    pub fn current_time(&self) -> f64 {
        self.samples_seen as f64 / self.sampling_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_capacity_from_window() {
        let store = SampleStore::new(500.0, 5.0).unwrap();
        assert_eq!(store.capacity(), 2500);
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejects_bad_rate() {
        assert!(matches!(
            SampleStore::new(0.0, 5.0),
            Err(HrvError::InvalidSamplingRate { .. })
        ));
        assert!(SampleStore::new(500.0, -1.0).is_err());
    }

    #[test]
    fn test_timestamps_advance_per_sample() {
        let mut store = SampleStore::with_capacity(100.0, 1000);
        store.append(&[1.0, 2.0]);
        store.append(&[3.0]);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.values, vec![1.0, 2.0, 3.0]);
        assert_relative_eq!(snapshot.times[0], 0.01);
        assert_relative_eq!(snapshot.times[1], 0.02);
        assert_relative_eq!(snapshot.times[2], 0.03);
        assert_relative_eq!(store.current_time(), 0.03);
    }

    #[test]
    fn test_bounded_keeps_most_recent() {
        let mut store = SampleStore::with_capacity(10.0, 25);
        for chunk in (0..100).collect::<Vec<_>>().chunks(7) {
            let chunk: Vec<f64> = chunk.iter().map(|&v| v as f64).collect();
            store.append(&chunk);
            assert!(store.len() <= 25);
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.values.len(), 25);
        assert_eq!(snapshot.times.len(), 25);
        let expected: Vec<f64> = (75..100).map(|v| v as f64).collect();
        assert_eq!(snapshot.values, expected);
        assert!(snapshot.times.windows(2).all(|w| w[1] > w[0]));
        assert_relative_eq!(snapshot.times[24], 10.0);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut store = SampleStore::with_capacity(10.0, 10);
        store.append(&[1.0, 2.0]);
        let snapshot = store.snapshot();
        store.append(&[3.0]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_reset_rewinds_cursor() {
        let mut store = SampleStore::with_capacity(10.0, 10);
        store.append(&[1.0, 2.0, 3.0]);
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.samples_seen(), 0);

        store.append(&[4.0]);
        assert_relative_eq!(store.snapshot().times[0], 0.1);
    }
}
