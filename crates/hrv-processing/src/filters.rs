//! Digital filters for ECG conditioning
//!
//! Every filter is a cascade of second-order sections in transposed direct
//! form II. Section memory is carried between calls, so filtering a stream
//! chunk by chunk gives the same output as filtering it in one go.

use crate::config::{ButterworthParams, FilterSettings, InitialState, NotchParams};
use hrv_core::{HrvError, HrvResult};
use num_complex::Complex;
use std::f64::consts::PI;

/// Common interface of the stateful filters in the cascade
pub trait SignalFilter: Send {
    /// Filter `samples` in place, updating internal memory
    fn process_in_place(&mut self, samples: &mut [f64]);

    /// Re-seed internal memory according to `initial`
    fn reset(&mut self, initial: InitialState);

    /// Human-readable filter name
    fn name(&self) -> &str;

    /// Magnitude response at `frequency` Hz
    fn magnitude_at(&self, frequency: f64) -> f64;
}

/// Filter types supported by the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    ButterworthLowpass,
    ButterworthHighpass,
    Notch,
}

/// Single biquad section (2nd order, or 1st order with `b2 = a2 = 0`)
#[derive(Debug, Clone, PartialEq)]
struct BiquadSection {
    // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    // Transposed direct form II memory
    z1: f64,
    z2: f64,
}

impl BiquadSection {
    fn new(b0: f64, b1: f64, b2: f64, a1: f64, a2: f64) -> Self {
        Self { b0, b1, b2, a1, a2, z1: 0.0, z2: 0.0 }
    }

    #[inline]
    fn process_sample(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Gain at 0 Hz
    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Memory the section settles into after a constant input of `level`
    fn settle_to(&mut self, level: f64) {
        let output = self.dc_gain() * level;
        self.z2 = self.b2 * level - self.a2 * output;
        self.z1 = self.b1 * level - self.a1 * output + self.z2;
    }

    fn clear(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    fn response(&self, omega: f64) -> Complex<f64> {
        let z1 = Complex::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        let numerator = self.b0 + z1 * self.b1 + z2 * self.b2;
        let denominator = 1.0 + z1 * self.a1 + z2 * self.a2;
        numerator / denominator
    }
}

/// Cascade of sections sharing one sampling rate
#[derive(Debug, Clone, PartialEq)]
struct SectionCascade {
    sections: Vec<BiquadSection>,
    sampling_rate: f64,
}

impl SectionCascade {
    fn new(sections: Vec<BiquadSection>, sampling_rate: f64, initial: InitialState) -> Self {
        let mut cascade = Self { sections, sampling_rate };
        cascade.reset(initial);
        cascade
    }

    fn process_in_place(&mut self, samples: &mut [f64]) {
        for sample in samples.iter_mut() {
            let mut value = *sample;
            for section in &mut self.sections {
                value = section.process_sample(value);
            }
            *sample = value;
        }
    }

    /// Step-response seeding scales each section's input level by the DC
    /// gain of the sections before it.
    fn reset(&mut self, initial: InitialState) {
        match initial {
            InitialState::Zero => self.sections.iter_mut().for_each(BiquadSection::clear),
            InitialState::StepResponse => {
                let mut level = 1.0;
                for section in &mut self.sections {
                    section.settle_to(level);
                    level *= section.dc_gain();
                }
            }
        }
    }

    fn magnitude_at(&self, frequency: f64) -> f64 {
        let omega = 2.0 * PI * frequency / self.sampling_rate;
        self.sections
            .iter()
            .map(|s| s.response(omega))
            .fold(Complex::new(1.0, 0.0), |acc, h| acc * h)
            .norm()
    }
}

/// Butterworth lowpass/highpass filter of arbitrary order.
///
/// Designed with the bilinear transform and frequency pre-warping, realised as
/// `order / 2` second-order sections plus one first-order section when the
/// order is odd.
#[derive(Debug, Clone, PartialEq)]
pub struct ButterworthFilter {
    filter_type: FilterType,
    params: ButterworthParams,
    cascade: SectionCascade,
}

impl ButterworthFilter {
    pub fn lowpass(params: ButterworthParams, sampling_rate: f64, initial: InitialState) -> HrvResult<Self> {
        Self::design(FilterType::ButterworthLowpass, params, sampling_rate, initial)
    }

    pub fn highpass(params: ButterworthParams, sampling_rate: f64, initial: InitialState) -> HrvResult<Self> {
        Self::design(FilterType::ButterworthHighpass, params, sampling_rate, initial)
    }

    fn design(
        filter_type: FilterType,
        params: ButterworthParams,
        sampling_rate: f64,
        initial: InitialState,
    ) -> HrvResult<Self> {
        let stage = match filter_type {
            FilterType::ButterworthHighpass => "highpass",
            _ => "lowpass",
        };
        params.validate(stage, sampling_rate)?;

        let highpass = filter_type == FilterType::ButterworthHighpass;
        // Pre-warp frequency for bilinear transform
        let k = (PI * params.cutoff_hz / sampling_rate).tan();
        let k2 = k * k;
        let order = params.order;

        let mut sections = Vec::with_capacity((order + 1) / 2);
        for pair in 0..order / 2 {
            // Damping 1/Q of this conjugate pole pair
            let damping = 2.0 * (PI * (2 * pair + 1) as f64 / (2 * order) as f64).sin();
            let norm = 1.0 / (1.0 + damping * k + k2);
            let a1 = 2.0 * (k2 - 1.0) * norm;
            let a2 = (1.0 - damping * k + k2) * norm;

            let (b0, b1, b2) = if highpass {
                (norm, -2.0 * norm, norm)
            } else {
                (k2 * norm, 2.0 * k2 * norm, k2 * norm)
            };
            sections.push(BiquadSection::new(b0, b1, b2, a1, a2));
        }

        if order % 2 == 1 {
            let norm = 1.0 / (1.0 + k);
            let a1 = (k - 1.0) * norm;
            let (b0, b1) = if highpass { (norm, -norm) } else { (k * norm, k * norm) };
            sections.push(BiquadSection::new(b0, b1, 0.0, a1, 0.0));
        }

        Ok(Self {
            filter_type,
            params,
            cascade: SectionCascade::new(sections, sampling_rate, initial),
        })
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn params(&self) -> &ButterworthParams {
        &self.params
    }

    /// Number of cascaded sections
    pub fn section_count(&self) -> usize {
        self.cascade.sections.len()
    }
}

impl SignalFilter for ButterworthFilter {
    fn process_in_place(&mut self, samples: &mut [f64]) {
        self.cascade.process_in_place(samples);
    }

    fn reset(&mut self, initial: InitialState) {
        self.cascade.reset(initial);
    }

    fn name(&self) -> &str {
        match self.filter_type {
            FilterType::ButterworthHighpass => "Butterworth Highpass",
            _ => "Butterworth Lowpass",
        }
    }

    fn magnitude_at(&self, frequency: f64) -> f64 {
        self.cascade.magnitude_at(frequency)
    }
}

/// Notch filter for powerline interference removal
#[derive(Debug, Clone, PartialEq)]
pub struct NotchFilter {
    params: NotchParams,
    cascade: SectionCascade,
}

impl NotchFilter {
    /// Second-order notch whose -3 dB bandwidth is `frequency / quality`
    pub fn new(params: NotchParams, sampling_rate: f64, initial: InitialState) -> HrvResult<Self> {
        params.validate(sampling_rate)?;

        let omega = 2.0 * PI * params.frequency_hz / sampling_rate;
        let bandwidth = omega / params.quality;
        let beta = (bandwidth / 2.0).tan();
        let gain = 1.0 / (1.0 + beta);
        let cos_omega = omega.cos();

        let section = BiquadSection::new(
            gain,
            -2.0 * gain * cos_omega,
            gain,
            -2.0 * gain * cos_omega,
            2.0 * gain - 1.0,
        );

        Ok(Self {
            params,
            cascade: SectionCascade::new(vec![section], sampling_rate, initial),
        })
    }

    pub fn params(&self) -> &NotchParams {
        &self.params
    }
}

impl SignalFilter for NotchFilter {
    fn process_in_place(&mut self, samples: &mut [f64]) {
        self.cascade.process_in_place(samples);
    }

    fn reset(&mut self, initial: InitialState) {
        self.cascade.reset(initial);
    }

    fn name(&self) -> &str {
        "Notch Filter"
    }

    fn magnitude_at(&self, frequency: f64) -> f64 {
        self.cascade.magnitude_at(frequency)
    }
}

/// Highpass, lowpass and notch filters applied in series.
///
/// Memory is seeded once at construction and after every reconfiguration;
/// `apply` is the only other thing that touches it.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    settings: FilterSettings,
    sampling_rate: f64,
    highpass: ButterworthFilter,
    lowpass: ButterworthFilter,
    notch: NotchFilter,
}

impl FilterStage {
    pub fn new(settings: FilterSettings, sampling_rate: f64) -> HrvResult<Self> {
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(HrvError::InvalidSamplingRate { rate: sampling_rate });
        }

        let initial = settings.initial_state;
        let highpass = ButterworthFilter::highpass(settings.highpass, sampling_rate, initial)?;
        let lowpass = ButterworthFilter::lowpass(settings.lowpass, sampling_rate, initial)?;
        let notch = NotchFilter::new(settings.notch, sampling_rate, initial)?;

        Ok(Self {
            settings,
            sampling_rate,
            highpass,
            lowpass,
            notch,
        })
    }

    /// Filter one chunk, carrying memory over to the next call
    pub fn apply(&mut self, chunk: &[f64]) -> Vec<f64> {
        let mut output = chunk.to_vec();
        for filter in self.filters_mut() {
            filter.process_in_place(&mut output);
        }
        output
    }

    /// Replace all parameters; coefficients are rebuilt and memory re-seeded.
    /// On error the stage is left untouched.
    pub fn configure(&mut self, settings: FilterSettings) -> HrvResult<()> {
        *self = Self::new(settings, self.sampling_rate)?;
        Ok(())
    }

    pub fn configure_highpass(&mut self, params: ButterworthParams) -> HrvResult<()> {
        let mut settings = self.settings.clone();
        settings.highpass = params;
        self.configure(settings)
    }

    pub fn configure_lowpass(&mut self, params: ButterworthParams) -> HrvResult<()> {
        let mut settings = self.settings.clone();
        settings.lowpass = params;
        self.configure(settings)
    }

    pub fn configure_notch(&mut self, params: NotchParams) -> HrvResult<()> {
        let mut settings = self.settings.clone();
        settings.notch = params;
        self.configure(settings)
    }

    /// Re-seed memory without touching coefficients
    pub fn reset(&mut self) {
        let initial = self.settings.initial_state;
        for filter in self.filters_mut() {
            filter.reset(initial);
        }
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Combined magnitude response of the cascade at `frequency` Hz
    pub fn magnitude_at(&self, frequency: f64) -> f64 {
        self.highpass.magnitude_at(frequency)
            * self.lowpass.magnitude_at(frequency)
            * self.notch.magnitude_at(frequency)
    }

    /// Filter names in cascade order
    pub fn names(&self) -> [&str; 3] {
        [self.highpass.name(), self.lowpass.name(), self.notch.name()]
    }

    fn filters_mut(&mut self) -> [&mut dyn SignalFilter; 3] {
        [&mut self.highpass, &mut self.lowpass, &mut self.notch]
    }
}
