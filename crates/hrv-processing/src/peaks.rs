//! Peak finding over a sampled waveform
//!
//! Local maxima are filtered in a fixed order: height, horizontal distance,
//! prominence, then width measured at half prominence.

use crate::config::DetectionConfig;
use serde::{Deserialize, Serialize};

/// Thresholds applied by [`find_peaks`]; `None` disables a criterion
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PeakCriteria {
    pub height: Option<f64>,
    pub distance: Option<usize>,
    pub prominence: Option<f64>,
    /// Inclusive `(min, max)` width in samples
    pub width: Option<(f64, f64)>,
}

impl From<&DetectionConfig> for PeakCriteria {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            height: config.height,
            distance: config.distance,
            prominence: Some(config.prominence),
            width: Some((config.min_width, config.max_width)),
        }
    }
}

/// A peak that passed every criterion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Sample index of the maximum (middle sample for flat tops)
    pub index: usize,
    pub height: f64,
    pub prominence: f64,
    /// Width at half prominence, in samples, linearly interpolated
    pub width: f64,
}

/// Find peaks in `x`, returned in ascending index order
pub fn find_peaks(x: &[f64], criteria: &PeakCriteria) -> Vec<Peak> {
    let mut candidates = local_maxima(x);

    if let Some(min_height) = criteria.height {
        candidates.retain(|&i| x[i] >= min_height);
    }

    if let Some(distance) = criteria.distance {
        candidates = select_by_distance(x, &candidates, distance);
    }

    let mut peaks = Vec::with_capacity(candidates.len());
    for index in candidates {
        let (prominence, left_base, right_base) = prominence_of(x, index);
        if criteria.prominence.is_some_and(|min| prominence < min) {
            continue;
        }

        let width = width_at_half_prominence(x, index, prominence, left_base, right_base);
        if let Some((min_width, max_width)) = criteria.width {
            if width < min_width || width > max_width {
                continue;
            }
        }

        peaks.push(Peak {
            index,
            height: x[index],
            prominence,
            width,
        });
    }

    peaks
}

/// Indices of local maxima, including the middle of flat plateaus.
/// The first and last samples are never maxima.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if x.len() < 3 {
        return maxima;
    }

    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let right = ahead - 1;
                maxima.push((i + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    maxima
}

/// Drop peaks closer than `distance` samples to a taller peak
fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];
    let mut by_height: Vec<usize> = (0..peaks.len()).collect();
    by_height.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in by_height.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Prominence plus the indices of the left and right bases.
///
/// Each base is the minimum reached while walking outward from the peak
/// until a higher sample (or the slice edge) is met.
fn prominence_of(x: &[f64], peak: usize) -> (f64, usize, usize) {
    let top = x[peak];

    let mut left_min = top;
    let mut left_base = peak;
    for i in (0..=peak).rev() {
        if x[i] > top {
            break;
        }
        if x[i] < left_min {
            left_min = x[i];
            left_base = i;
        }
    }

    let mut right_min = top;
    let mut right_base = peak;
    for (i, &value) in x.iter().enumerate().skip(peak) {
        if value > top {
            break;
        }
        if value < right_min {
            right_min = value;
            right_base = i;
        }
    }

    (top - left_min.max(right_min), left_base, right_base)
}

fn width_at_half_prominence(
    x: &[f64],
    peak: usize,
    prominence: f64,
    left_base: usize,
    right_base: usize,
) -> f64 {
    let level = x[peak] - prominence * 0.5;

    let mut i = peak;
    while left_base < i && level < x[i] {
        i -= 1;
    }
    let mut left = i as f64;
    if x[i] < level {
        left += (level - x[i]) / (x[i + 1] - x[i]);
    }

    let mut i = peak;
    while i < right_base && level < x[i] {
        i += 1;
    }
    let mut right = i as f64;
    if x[i] < level {
        right -= (level - x[i]) / (x[i - 1] - x[i]);
    }

    right - left
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn triangle_train(len: usize, centers: &[usize], half_width: usize, amplitude: f64) -> Vec<f64> {
        let mut x = vec![0.0f64; len];
        for &center in centers {
            for offset in 0..=half_width {
                let value = amplitude * (1.0 - offset as f64 / half_width as f64);
                if center + offset < len {
                    x[center + offset] = x[center + offset].max(value);
                }
                if center >= offset {
                    x[center - offset] = x[center - offset].max(value);
                }
            }
        }
        x
    }

    #[test]
    fn test_local_maxima_and_plateaus() {
        let x = [0.0, 1.0, 0.0, 2.0, 2.0, 2.0, 0.0, 3.0, 3.0];
        assert_eq!(local_maxima(&x), vec![1, 4]);
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_finds_isolated_triangles() {
        let x = triangle_train(1000, &[100, 400, 700], 20, 10.0);
        let peaks = find_peaks(&x, &PeakCriteria::default());

        let indices: Vec<usize> = peaks.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![100, 400, 700]);
        for peak in &peaks {
            assert_abs_diff_eq!(peak.prominence, 10.0);
            // half prominence is reached 10 samples either side
            assert_abs_diff_eq!(peak.width, 20.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_height_and_prominence_thresholds() {
        let mut x = triangle_train(600, &[100, 300], 20, 10.0);
        for v in x.iter_mut().skip(450).take(40) {
            *v += 3.0;
        }
        x[470] = 4.0;

        let criteria = PeakCriteria {
            height: Some(5.0),
            ..PeakCriteria::default()
        };
        assert_eq!(find_peaks(&x, &criteria).len(), 2);

        let criteria = PeakCriteria {
            prominence: Some(5.0),
            ..PeakCriteria::default()
        };
        assert_eq!(find_peaks(&x, &criteria).len(), 2);
    }

    #[test]
    fn test_width_range() {
        let mut x = triangle_train(1000, &[200], 10, 10.0);
        let wide = triangle_train(1000, &[600], 80, 10.0);
        for (a, b) in x.iter_mut().zip(&wide) {
            *a = a.max(*b);
        }

        let criteria = PeakCriteria {
            width: Some((5.0, 40.0)),
            ..PeakCriteria::default()
        };
        let peaks = find_peaks(&x, &criteria);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 200);
    }

    #[test]
    fn test_distance_keeps_taller_peak() {
        let mut x = triangle_train(500, &[100], 5, 10.0);
        let smaller = triangle_train(500, &[130], 5, 6.0);
        for (a, b) in x.iter_mut().zip(&smaller) {
            *a = a.max(*b);
        }

        assert_eq!(find_peaks(&x, &PeakCriteria::default()).len(), 2);

        let criteria = PeakCriteria {
            distance: Some(50),
            ..PeakCriteria::default()
        };
        let peaks = find_peaks(&x, &criteria);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 100);
    }

    #[test]
    fn test_truncated_peak_has_reduced_prominence() {
        // Peak near the end of the slice: the right base is cut short
        let x = triangle_train(120, &[110], 20, 10.0);
        let x = &x[..113];
        let peaks = find_peaks(x, &PeakCriteria::default());
        assert_eq!(peaks.len(), 1);
        assert_abs_diff_eq!(peaks[0].prominence, 1.0, epsilon = 1e-9);

        let criteria = PeakCriteria {
            prominence: Some(5.0),
            ..PeakCriteria::default()
        };
        assert!(find_peaks(x, &criteria).is_empty());
    }

    #[test]
    fn test_from_detection_config() {
        let criteria = PeakCriteria::from(&DetectionConfig::default());
        assert_eq!(criteria.prominence, Some(1000.0));
        assert_eq!(criteria.height, Some(500.0));
        assert_eq!(criteria.width, Some((10.0, 100.0)));
        assert_eq!(criteria.distance, Some(200));
    }

    #[test]
    fn test_empty_and_flat_inputs() {
        assert!(find_peaks(&[], &PeakCriteria::default()).is_empty());
        assert!(find_peaks(&[1.0; 100], &PeakCriteria::default()).is_empty());
    }
}
