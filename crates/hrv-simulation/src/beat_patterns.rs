//! Heart rate patterns driving the synthetic beat train

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// How the heart rate evolves over time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BeatPattern {
    /// Fixed rate
    Constant { bpm: f64 },
    /// Respiratory sinus arrhythmia: rate swings with breathing
    Respiratory {
        mean_bpm: f64,
        depth_bpm: f64,
        breath_hz: f64,
    },
    /// Linear rate change, held at `end_bpm` afterwards
    Ramp {
        start_bpm: f64,
        end_bpm: f64,
        duration: f64,
    },
}

impl BeatPattern {
    /// Heart rate in BPM at `time` seconds
    pub fn rate_at(&self, time: f64) -> f64 {
        match *self {
            BeatPattern::Constant { bpm } => bpm,

            BeatPattern::Respiratory {
                mean_bpm,
                depth_bpm,
                breath_hz,
            } => mean_bpm + depth_bpm * (2.0 * PI * breath_hz * time).sin(),

            BeatPattern::Ramp {
                start_bpm,
                end_bpm,
                duration,
            } => {
                if time >= duration {
                    end_bpm
                } else {
                    start_bpm + (end_bpm - start_bpm) * (time / duration)
                }
            }
        }
    }

    /// Interval until the next beat for a beat at `time`, in seconds
    pub fn interval_at(&self, time: f64) -> f64 {
        60.0 / self.rate_at(time)
    }

    /// Lowest rate the pattern can produce
    pub fn min_rate(&self) -> f64 {
        match *self {
            BeatPattern::Constant { bpm } => bpm,
            BeatPattern::Respiratory {
                mean_bpm, depth_bpm, ..
            } => mean_bpm - depth_bpm.abs(),
            BeatPattern::Ramp {
                start_bpm, end_bpm, ..
            } => start_bpm.min(end_bpm),
        }
    }

    /// Highest rate the pattern can produce
    pub fn max_rate(&self) -> f64 {
        match *self {
            BeatPattern::Constant { bpm } => bpm,
            BeatPattern::Respiratory {
                mean_bpm, depth_bpm, ..
            } => mean_bpm + depth_bpm.abs(),
            BeatPattern::Ramp {
                start_bpm, end_bpm, ..
            } => start_bpm.max(end_bpm),
        }
    }

    /// Beat times from `first` up to and including `until`
    pub fn beat_times(&self, first: f64, until: f64) -> Vec<f64> {
        let mut times = Vec::new();
        let mut t = first;
        while t <= until {
            times.push(t);
            t += self.interval_at(t);
        }
        times
    }

    pub fn description(&self) -> &'static str {
        match self {
            BeatPattern::Constant { .. } => "Constant rate",
            BeatPattern::Respiratory { .. } => "Respiratory sinus arrhythmia",
            BeatPattern::Ramp { .. } => "Rate ramp",
        }
    }

    pub fn presets() -> Vec<(&'static str, BeatPattern)> {
        vec![
            ("Resting", BeatPattern::Constant { bpm: 60.0 }),
            ("Elevated", BeatPattern::Constant { bpm: 90.0 }),
            (
                "Resonant Breathing",
                BeatPattern::Respiratory {
                    mean_bpm: 65.0,
                    depth_bpm: 8.0,
                    breath_hz: 0.1,
                },
            ),
            (
                "Shallow Breathing",
                BeatPattern::Respiratory {
                    mean_bpm: 70.0,
                    depth_bpm: 2.0,
                    breath_hz: 0.25,
                },
            ),
            (
                "Recovery",
                BeatPattern::Ramp {
                    start_bpm: 110.0,
                    end_bpm: 70.0,
                    duration: 60.0,
                },
            ),
        ]
    }
}

impl Default for BeatPattern {
    fn default() -> Self {
        BeatPattern::Constant { bpm: 60.0 }
    }
}
