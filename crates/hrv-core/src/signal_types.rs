//! Value types exchanged between pipeline stages

use serde::{Deserialize, Serialize};

/// Immutable copy of the sample store contents.
///
/// `values[i]` was sampled at `times[i]`; both vectors always have the same
/// length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSnapshot {
    /// Filtered amplitudes, oldest first
    pub values: Vec<f64>,
    /// Synthetic timestamps in seconds since start, strictly increasing
    pub times: Vec<f64>,
}

impl SampleSnapshot {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keep only samples strictly after `cutoff` seconds
    pub fn after(&self, cutoff: f64) -> SampleSnapshot {
        let start = self.times.partition_point(|&t| t <= cutoff);
        SampleSnapshot {
            values: self.values[start..].to_vec(),
            times: self.times[start..].to_vec(),
        }
    }
}

/// One detected heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    /// Time of the R-peak in seconds since start
    pub time: f64,
    /// Prominence of the peak in signal units
    pub prominence: f64,
}

/// One-sided power spectrum of heart-rate variability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Bin frequencies in Hz, ascending from 0
    pub frequencies: Vec<f64>,
    /// Power per bin
    pub powers: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Frequency spacing between adjacent bins
    pub fn resolution(&self) -> Option<f64> {
        match self.frequencies.as_slice() {
            [first, second, ..] => Some(second - first),
            _ => None,
        }
    }

    /// Bin with the largest power, as `(frequency, power)`
    pub fn dominant(&self) -> Option<(f64, f64)> {
        self.frequencies
            .iter()
            .zip(&self.powers)
            .filter(|(_, p)| p.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&f, &p)| (f, p))
    }
}

/// Coherence score plus the bell-shaped display curve scaled by it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceCurve {
    /// Scalar coherence value
    pub value: f64,
    /// Fixed x positions of the display curve
    pub x: Vec<f64>,
    /// Unit-height Gaussian scaled by `value`
    pub y: Vec<f64>,
}
