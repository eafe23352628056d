//! Coherence score from the variability spectrum

use crate::config::{CoherenceConfig, FrequencyBand};
use hrv_core::{CoherenceCurve, HrvError, HrvResult, Spectrum};

#[derive(Debug, Clone)]
pub struct CoherenceScorer {
    config: CoherenceConfig,
    x: Vec<f64>,
    bell: Vec<f64>,
}

impl CoherenceScorer {
    pub fn new(config: CoherenceConfig) -> HrvResult<Self> {
        config.validate()?;
        let x = linspace(-config.curve_extent, config.curve_extent, config.curve_points);

        let raw: Vec<f64> = x.iter().map(|v| (-v * v / 2.0).exp()).collect();
        let top = raw.iter().cloned().fold(0.0, f64::max);
        let bell = raw.into_iter().map(|v| v / top).collect();

        Ok(Self { config, x, bell })
    }

    pub fn config(&self) -> &CoherenceConfig {
        &self.config
    }

    /// `(peak / (total - peak))^2` where `peak` is the power within the
    /// half width of the strongest resonance-band bin and `total` is the
    /// power over the total band.
    pub fn score(&self, spectrum: &Spectrum) -> HrvResult<f64> {
        let (band_f, band_p) = restrict(spectrum, &self.config.resonance_band);
        if band_f.is_empty() {
            return Err(HrvError::InsufficientData {
                needed: 1,
                available: 0,
            });
        }

        let strongest = argmax(&band_p);
        let center = band_f[strongest];
        let window = FrequencyBand::new(
            center - self.config.peak_half_width_hz,
            center + self.config.peak_half_width_hz,
        );
        let (peak_f, peak_p): (Vec<f64>, Vec<f64>) = band_f
            .iter()
            .zip(&band_p)
            .filter(|(f, _)| window.contains(**f))
            .map(|(f, p)| (*f, *p))
            .unzip();
        let peak = trapezoid(&peak_f, &peak_p);

        let (total_f, total_p) = restrict(spectrum, &self.config.total_band);
        let total = trapezoid(&total_f, &total_p);

        let remainder = total - peak;
        if !remainder.is_finite() || remainder <= f64::EPSILON * total.abs() {
            return Err(HrvError::NumericDegeneracy {
                reason: "resonance peak holds all band power",
            });
        }

        let value = (peak / remainder).powi(2);
        if !value.is_finite() {
            return Err(HrvError::NumericDegeneracy {
                reason: "coherence ratio overflow",
            });
        }
        Ok(value)
    }

    /// Fixed bell shape scaled to height `value`
    pub fn curve(&self, value: f64) -> CoherenceCurve {
        CoherenceCurve {
            value,
            x: self.x.clone(),
            y: self.bell.iter().map(|b| b * value).collect(),
        }
    }

    pub fn evaluate(&self, spectrum: &Spectrum) -> HrvResult<CoherenceCurve> {
        self.score(spectrum).map(|value| self.curve(value))
    }
}

fn restrict(spectrum: &Spectrum, band: &FrequencyBand) -> (Vec<f64>, Vec<f64>) {
    spectrum
        .frequencies
        .iter()
        .zip(&spectrum.powers)
        .filter(|(f, _)| band.contains(**f))
        .map(|(f, p)| (*f, *p))
        .unzip()
}

/// Index of the first maximum
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

fn linspace(start: f64, stop: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (points - 1) as f64;
            (0..points).map(|i| start + i as f64 * step).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn scorer() -> CoherenceScorer {
        CoherenceScorer::new(CoherenceConfig::default()).unwrap()
    }

    fn spectrum_from(power: impl Fn(f64) -> f64) -> Spectrum {
        let frequencies: Vec<f64> = (0..=500).map(|k| k as f64 * 0.001).collect();
        let powers = frequencies.iter().map(|&f| power(f)).collect();
        Spectrum {
            frequencies,
            powers,
        }
    }

    #[test]
    fn test_trapezoid_and_linspace() {
        assert_abs_diff_eq!(trapezoid(&[0.0, 1.0, 3.0], &[1.0, 1.0, 3.0]), 5.0);
        assert_eq!(trapezoid(&[1.0], &[4.0]), 0.0);
        assert_eq!(linspace(-1.0, 1.0, 5), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_isolated_peak_scores_high() {
        let spectrum = spectrum_from(|f| 1e-3 + (-(f - 0.1).powi(2) / (2.0 * 0.005f64.powi(2))).exp());
        let value = scorer().score(&spectrum).unwrap();
        assert!(value.is_finite());
        assert!(value > 100.0, "coherence {value}");
    }

    #[test]
    fn test_flat_spectrum_scores_low() {
        let value = scorer().score(&spectrum_from(|_| 1.0)).unwrap();
        // Peak window is clipped at the lower band edge
        assert!(value >= 0.0);
        assert!(value < 0.01);
    }

    #[test]
    fn test_degenerate_spectra() {
        let zero = spectrum_from(|_| 0.0);
        assert!(matches!(
            scorer().score(&zero),
            Err(HrvError::NumericDegeneracy { .. })
        ));

        // All band power inside the peak window
        let narrow = spectrum_from(|f| if (f - 0.1).abs() < 0.005 { 1.0 } else { 0.0 });
        assert!(matches!(
            scorer().evaluate(&narrow),
            Err(HrvError::NumericDegeneracy { .. })
        ));
    }

    #[test]
    fn test_empty_resonance_band() {
        let spectrum = Spectrum {
            frequencies: vec![0.0, 0.5],
            powers: vec![1.0, 1.0],
        };
        assert!(matches!(
            scorer().score(&spectrum),
            Err(HrvError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_curve_shape() {
        let curve = scorer().curve(2.5);
        assert_eq!(curve.x.len(), 1000);
        assert_eq!(curve.y.len(), 1000);
        assert_abs_diff_eq!(curve.x[0], -4.0);
        assert_abs_diff_eq!(curve.x[999], 4.0);

        let top = curve.y.iter().cloned().fold(0.0, f64::max);
        assert_abs_diff_eq!(top, 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(curve.y[0], curve.y[999], epsilon = 1e-12);
        assert!(curve.y[0] < 1e-3);
    }
}
