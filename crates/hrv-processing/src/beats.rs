//! Beat detection and the beat / RR interval history

use crate::config::DetectionConfig;
use crate::peaks::{find_peaks, PeakCriteria};
use hrv_core::{Beat, HrvResult, RingBuffer, SampleSnapshot};
use tracing::trace;

/// Finds beats in a filtered sample snapshot
#[derive(Debug, Clone)]
pub struct PeakDetector {
    config: DetectionConfig,
    criteria: PeakCriteria,
}

impl PeakDetector {
    pub fn new(config: DetectionConfig) -> HrvResult<Self> {
        config.validate()?;
        let criteria = PeakCriteria::from(&config);
        Ok(Self { config, criteria })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Detect beats newer than the refractory window after `last_beat_time`.
    ///
    /// Returned beats are in ascending time order. An empty result means
    /// there was nothing to do this cycle.
    pub fn scan(&self, snapshot: &SampleSnapshot, last_beat_time: Option<f64>) -> Vec<Beat> {
        let candidate = match last_beat_time {
            Some(last) => snapshot.after(last + self.config.refractory_seconds),
            None => snapshot.clone(),
        };

        if candidate.is_empty() {
            trace!("No samples past the refractory window");
            return Vec::new();
        }

        find_peaks(&candidate.values, &self.criteria)
            .into_iter()
            .map(|peak| Beat {
                time: candidate.times[peak.index],
                prominence: peak.prominence,
            })
            .collect()
    }
}

/// Bounded beat and RR interval history.
///
/// Beat times are strictly increasing and `last_beat_time` never moves
/// backward. The first interval of each batch is measured from the last
/// beat of the previous batch.
#[derive(Debug, Clone)]
pub struct BeatHistory {
    beats: RingBuffer<Beat>,
    intervals: RingBuffer<f64>,
    last_beat_time: Option<f64>,
}

impl BeatHistory {
    pub fn new(beat_capacity: usize, interval_capacity: usize) -> Self {
        Self {
            beats: RingBuffer::with_capacity(beat_capacity),
            intervals: RingBuffer::with_capacity(interval_capacity),
            last_beat_time: None,
        }
    }

    /// One fewer interval than beats are kept
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.history_len, config.history_len.saturating_sub(1))
    }

    /// Append a batch of beats in time order, returning how many were kept.
    /// Beats at or before the last recorded beat are skipped.
    pub fn record(&mut self, beats: &[Beat]) -> usize {
        let mut accepted = 0;
        for beat in beats {
            if let Some(last) = self.last_beat_time {
                if beat.time <= last {
                    continue;
                }
                self.intervals.push(beat.time - last);
            }
            self.beats.push(*beat);
            self.last_beat_time = Some(beat.time);
            accepted += 1;
        }
        accepted
    }

    pub fn last_beat_time(&self) -> Option<f64> {
        self.last_beat_time
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn interval_count(&self) -> usize {
        self.intervals.len()
    }

    pub fn beats(&self) -> Vec<Beat> {
        self.beats.to_vec()
    }

    /// Beat times and prominences as parallel vectors
    pub fn beat_series(&self) -> (Vec<f64>, Vec<f64>) {
        self.beats.iter().map(|b| (b.time, b.prominence)).unzip()
    }

    pub fn intervals(&self) -> Vec<f64> {
        self.intervals.to_vec()
    }

    /// The `n` most recent RR intervals
    pub fn recent_intervals(&self, n: usize) -> Vec<f64> {
        self.intervals.tail(n)
    }

    /// RR intervals paired with the time of the beat that opens each one
    pub fn aligned_intervals(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.intervals.len().min(self.beats.len().saturating_sub(1));
        let opening = self.beats.len().saturating_sub(1);

        let times = self
            .beats
            .iter()
            .take(opening)
            .skip(opening - n)
            .map(|b| b.time)
            .collect();
        (times, self.intervals.tail(n))
    }

    pub fn clear(&mut self) {
        self.beats.clear();
        self.intervals.clear();
        self.last_beat_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::filters::FilterStage;
    use approx::assert_abs_diff_eq;
    use hrv_core::SampleStore;
    use hrv_simulation::{EcgConfig, EcgSimulator};
    use std::f64::consts::PI;

    const FS: f64 = 500.0;

    /// Half-cosine pulses of 80 ms, timestamped like a `SampleStore`
    fn pulse_snapshot(duration: f64, beat_times: &[f64]) -> SampleSnapshot {
        let n = (duration * FS).round() as usize;
        let times: Vec<f64> = (1..=n).map(|i| i as f64 / FS).collect();
        let values = times
            .iter()
            .map(|&t| {
                beat_times
                    .iter()
                    .map(|&b| {
                        let dt = t - b;
                        if dt.abs() < 0.04 {
                            1500.0 * (PI * dt / 0.08).cos()
                        } else {
                            0.0
                        }
                    })
                    .sum()
            })
            .collect();
        SampleSnapshot { values, times }
    }

    fn detector() -> PeakDetector {
        PeakDetector::new(DetectionConfig::default()).unwrap()
    }

    fn beat(time: f64) -> Beat {
        Beat {
            time,
            prominence: 1.0,
        }
    }

    #[test]
    fn test_scan_maps_indices_to_times() {
        let snapshot = pulse_snapshot(4.0, &[1.0, 2.0, 3.0]);
        let beats = detector().scan(&snapshot, None);

        assert_eq!(beats.len(), 3);
        for (beat, expected) in beats.iter().zip([1.0, 2.0, 3.0]) {
            assert_abs_diff_eq!(beat.time, expected, epsilon = 1e-9);
            assert!(beat.prominence >= 1000.0);
        }
    }

    #[test]
    fn test_refractory_window_skips_previous_beat() {
        let snapshot = pulse_snapshot(3.0, &[1.0, 2.0]);
        let beats = detector().scan(&snapshot, Some(1.0));

        assert_eq!(beats.len(), 1);
        assert_abs_diff_eq!(beats[0].time, 2.0, epsilon = 1e-9);

        // Nothing left past the window
        assert!(detector().scan(&snapshot, Some(3.0)).is_empty());
    }

    #[test]
    fn test_scan_without_peaks_is_empty() {
        let snapshot = pulse_snapshot(2.0, &[]);
        assert!(detector().scan(&snapshot, None).is_empty());
        assert!(detector().scan(&SampleSnapshot::default(), None).is_empty());
    }

    #[test]
    fn test_small_pulses_fail_prominence() {
        let mut snapshot = pulse_snapshot(3.0, &[1.0, 2.0]);
        for v in &mut snapshot.values {
            *v *= 0.5;
        }
        assert!(detector().scan(&snapshot, None).is_empty());
    }

    #[test]
    fn test_detects_beats_in_filtered_noisy_ecg() {
        let config = AnalysisConfig::default();
        let mut simulator = EcgSimulator::new(EcgConfig {
            seed: Some(3),
            ..EcgConfig::default()
        })
        .unwrap();
        let mut stage = FilterStage::new(config.filters.clone(), config.sampling_rate).unwrap();
        let mut store = SampleStore::new(config.sampling_rate, 10.0).unwrap();

        for chunk in simulator.generate(10.0).chunks(16) {
            store.append(&stage.apply(chunk));
        }

        // The pulse at 10 s is cut off by the end of the window
        let beats = detector().scan(&store.snapshot(), None);
        assert_eq!(beats.len(), 9);
        for (beat, expected) in beats.iter().zip(1..) {
            assert_abs_diff_eq!(beat.time, expected as f64, epsilon = 0.02);
        }
    }

    #[test]
    fn test_rr_bridging_across_cycles() {
        let beat_times = [0.8, 1.75];
        let detector = detector();

        // Single pass over both beats
        let full = pulse_snapshot(2.5, &beat_times);
        let mut single = BeatHistory::from_config(detector.config());
        single.record(&detector.scan(&full, None));

        // First cycle only sees the first beat, the second sees both
        let partial = pulse_snapshot(1.2, &beat_times);
        let mut split = BeatHistory::from_config(detector.config());
        split.record(&detector.scan(&partial, split.last_beat_time()));
        assert_eq!(split.len(), 1);
        assert_eq!(split.interval_count(), 0);
        split.record(&detector.scan(&full, split.last_beat_time()));

        assert_eq!(split.len(), 2);
        assert_eq!(split.intervals().len(), 1);
        assert_abs_diff_eq!(split.intervals()[0], 0.95, epsilon = 1e-9);
        assert_eq!(split.intervals(), single.intervals());
    }

    #[test]
    fn test_history_is_strictly_increasing() {
        let mut history = BeatHistory::new(10, 9);
        assert_eq!(history.record(&[beat(1.0), beat(2.0)]), 2);
        assert_eq!(history.record(&[beat(1.5), beat(2.0), beat(3.0)]), 1);
        assert_eq!(history.record(&[]), 0);

        let (times, _) = history.beat_series();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
        assert_eq!(history.last_beat_time(), Some(3.0));
        assert_eq!(history.intervals(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = BeatHistory::new(5, 4);
        let beats: Vec<Beat> = (1..=20).map(|i| beat(i as f64 * 0.5)).collect();
        history.record(&beats);

        assert_eq!(history.len(), 5);
        assert_eq!(history.interval_count(), 4);
        assert_eq!(history.last_beat_time(), Some(10.0));
        assert_eq!(history.recent_intervals(2), vec![0.5, 0.5]);
    }

    #[test]
    fn test_aligned_intervals_pair_opening_beats() {
        let mut history = BeatHistory::new(4, 10);
        history.record(&[beat(1.0), beat(2.0), beat(3.5), beat(4.0), beat(6.0)]);

        let (times, intervals) = history.aligned_intervals();
        assert_eq!(times, vec![2.0, 3.5, 4.0]);
        assert_eq!(intervals, vec![1.5, 0.5, 2.0]);
    }

    #[test]
    fn test_clear() {
        let mut history = BeatHistory::new(4, 3);
        history.record(&[beat(1.0), beat(2.0)]);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.last_beat_time(), None);
        assert_eq!(history.interval_count(), 0);
    }
}
