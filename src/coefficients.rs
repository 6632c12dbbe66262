//! Turns a [`ChainSettings`] snapshot into biquad taps.
//!
//! Designs run in `f64` through the `biquad` crate's RBJ formulas and stay in `f64`. Rounded to
//! `f32`, a 20 Hz section at 768 kHz lands its poles on the unit circle. Cut filters are Butterworth cascades: every section shares the cutoff and the bilinear
//! prewarp, only the Q differs.
//!
//! Precondition: every designed frequency sits below Nyquist. The parameter ranges already
//! guarantee it for the usual sample rates, the design clamps anyway.

use ::biquad::{Coefficients, ToHertz, Type};
use std::f64::consts::PI;
use thiserror::Error;

use crate::params::{ChainSettings, Slope, MIN_FREQUENCY};
use crate::section::{is_stable, CoefficientSet, BYPASS};

/// Upper bound on sections per cut filter, reached at 48 dB/oct.
pub const MAX_CUT_SECTIONS: usize = 4;
/// Highest designed frequency as a fraction of Nyquist.
pub const NYQUIST_GUARD: f32 = 0.99;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum DesignError {
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(f32),
    #[error("invalid {name}: {value}")]
    InvalidSetting { name: &'static str, value: f32 },
    #[error("filter design rejected {frequency} Hz at a {sample_rate} Hz sample rate")]
    Rejected { frequency: f32, sample_rate: f32 },
    #[error("designed section at {frequency} Hz is not stable")]
    Unstable { frequency: f32 },
}

pub type Result<T> = std::result::Result<T, DesignError>;

/// Taps for one cut filter, in processing order. Slots past `len` hold [`BYPASS`].
#[derive(Debug, Clone, Copy)]
pub struct CutCoefficients {
    sections: [CoefficientSet; MAX_CUT_SECTIONS],
    len: usize,
}

impl CutCoefficients {
    pub fn as_slice(&self) -> &[CoefficientSet] {
        &self.sections[..self.len]
    }

}

/// Everything one refresh installs into a chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainCoefficients {
    pub low_cut: CutCoefficients,
    pub peak: CoefficientSet,
    pub high_cut: CutCoefficients,
}

#[derive(Debug, Clone, Copy)]
enum SectionKind {
    LowPass,
    HighPass,
    Peak { gain_db: f64 },
}

/// Designs all three stages, always low cut, then peak, then high cut. Nothing is returned unless
/// every stage succeeded.
pub fn design_chain(settings: &ChainSettings, sample_rate: f32) -> Result<ChainCoefficients> {
    let low_cut = make_low_cut_filter(settings, sample_rate)?;
    let peak = make_peak_filter(settings, sample_rate)?;
    let high_cut = make_high_cut_filter(settings, sample_rate)?;

    Ok(ChainCoefficients {
        low_cut,
        peak,
        high_cut,
    })
}

/// Bell filter around `peak_freq`. The linear gain is `10^(dB / 20)`; `biquad` takes the decibel
/// value directly.
pub fn make_peak_filter(settings: &ChainSettings, sample_rate: f32) -> Result<CoefficientSet> {
    let frequency = clamp_frequency("peak frequency", settings.peak_freq, sample_rate)?;

    let quality = settings.peak_quality;
    if !(quality.is_finite() && quality > 0.0) {
        return Err(DesignError::InvalidSetting {
            name: "peak quality",
            value: quality,
        });
    }
    let gain_db = settings.peak_gain_db;
    if !gain_db.is_finite() {
        return Err(DesignError::InvalidSetting {
            name: "peak gain",
            value: gain_db,
        });
    }

    design_section(
        SectionKind::Peak {
            gain_db: gain_db as f64,
        },
        frequency,
        quality as f64,
        sample_rate,
    )
}

/// Butterworth high-pass at `low_cut_freq`.
pub fn make_low_cut_filter(settings: &ChainSettings, sample_rate: f32) -> Result<CutCoefficients> {
    let frequency = clamp_frequency("low cut frequency", settings.low_cut_freq, sample_rate)?;
    design_cut(SectionKind::HighPass, frequency, settings.low_cut_slope, sample_rate)
}

/// Butterworth low-pass at `high_cut_freq`.
pub fn make_high_cut_filter(settings: &ChainSettings, sample_rate: f32) -> Result<CutCoefficients> {
    let frequency = clamp_frequency("high cut frequency", settings.high_cut_freq, sample_rate)?;
    design_cut(SectionKind::LowPass, frequency, settings.high_cut_slope, sample_rate)
}

/// Q of section `index` in an even-order Butterworth cascade, lowest Q first.
pub fn butterworth_q(order: usize, index: usize) -> f64 {
    let angle = (2 * index + 1) as f64 * PI / (2 * order) as f64;
    1.0 / (2.0 * angle.cos())
}

fn design_cut(
    kind: SectionKind,
    frequency: f32,
    slope: Slope,
    sample_rate: f32,
) -> Result<CutCoefficients> {
    let order = slope.order();
    let len = slope.sections();

    let mut sections = [BYPASS; MAX_CUT_SECTIONS];
    for (index, section) in sections.iter_mut().take(len).enumerate() {
        *section = design_section(kind, frequency, butterworth_q(order, index), sample_rate)?;
    }

    Ok(CutCoefficients { sections, len })
}

fn design_section(
    kind: SectionKind,
    frequency: f32,
    quality: f64,
    sample_rate: f32,
) -> Result<CoefficientSet> {
    let fs = (sample_rate as f64).hz();
    let f0 = (frequency as f64).hz();

    let coefficients = match kind {
        SectionKind::LowPass => Coefficients::<f64>::from_params(Type::LowPass, fs, f0, quality),
        SectionKind::HighPass => Coefficients::<f64>::from_params(Type::HighPass, fs, f0, quality),
        SectionKind::Peak { gain_db } => {
            Coefficients::<f64>::from_params(Type::PeakingEQ(gain_db), fs, f0, quality)
        }
    }
    .map_err(|_| DesignError::Rejected {
        frequency,
        sample_rate,
    })?;

    if !is_stable(&coefficients) {
        return Err(DesignError::Unstable { frequency });
    }

    Ok(coefficients)
}

fn clamp_frequency(name: &'static str, frequency: f32, sample_rate: f32) -> Result<f32> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(DesignError::InvalidSampleRate(sample_rate));
    }
    if !frequency.is_finite() {
        return Err(DesignError::InvalidSetting {
            name,
            value: frequency,
        });
    }

    let ceiling = sample_rate * 0.5 * NYQUIST_GUARD;
    Ok(frequency.clamp(MIN_FREQUENCY.min(ceiling), ceiling))
}
