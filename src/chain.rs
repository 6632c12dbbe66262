use std::f64::consts::PI;

use crate::coefficients::{ChainCoefficients, CutCoefficients, MAX_CUT_SECTIONS};
use crate::section::{CoefficientSet, Section};

/// Up to four second-order sections run in slot order. Slots the current slope does not need are
/// bypassed.
#[derive(Debug, Clone, Default)]
pub struct CutFilter {
    sections: [Section; MAX_CUT_SECTIONS],
}

impl CutFilter {
    /// Swaps in freshly designed taps slot by slot. Histories of slots that stay in use are kept,
    /// slots past the new length become pass-through with a cleared history.
    pub fn update(&mut self, coefficients: &CutCoefficients) {
        let new = coefficients.as_slice();
        for (index, section) in self.sections.iter_mut().enumerate() {
            match new.get(index) {
                Some(taps) => section.set_coefficients(*taps),
                None => section.bypass(),
            }
        }
    }

    pub fn active_sections(&self) -> usize {
        self.sections.iter().filter(|s| s.is_active()).count()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn reset(&mut self) {
        for section in self.sections.iter_mut() {
            section.reset();
        }
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        self.sections
            .iter_mut()
            .fold(x, |acc, section| section.process_sample(acc))
    }
}

/// Low cut, peak, high cut, in that order, for one channel.
#[derive(Debug, Clone, Default)]
pub struct MonoChain {
    low_cut: CutFilter,
    peak: Section,
    high_cut: CutFilter,
}

impl MonoChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, coefficients: &ChainCoefficients) {
        self.low_cut.update(&coefficients.low_cut);
        self.update_peak(coefficients.peak);
        self.high_cut.update(&coefficients.high_cut);
    }

    pub fn update_peak(&mut self, coefficients: CoefficientSet) {
        self.peak.set_coefficients(coefficients);
    }

    pub fn low_cut(&self) -> &CutFilter {
        &self.low_cut
    }

    pub fn peak(&self) -> &Section {
        &self.peak
    }

    pub fn high_cut(&self) -> &CutFilter {
        &self.high_cut
    }

    /// Clears every history, keeps the taps.
    pub fn reset(&mut self) {
        self.low_cut.reset();
        self.peak.reset();
        self.high_cut.reset();
    }

    /// Filters `samples` in place. Only arithmetic on state owned by the chain.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let low = self.low_cut.process_sample(*sample);
            let peak = self.peak.process_sample(low);
            *sample = self.high_cut.process_sample(peak);
        }
    }

    /// Magnitude of the whole cascade at `frequency`, in dB.
    pub fn magnitude_db(&self, frequency: f32, sample_rate: f32) -> f32 {
        let omega = 2.0 * PI * frequency as f64 / sample_rate as f64;
        let magnitude = self
            .low_cut
            .sections
            .iter()
            .chain(std::iter::once(&self.peak))
            .chain(self.high_cut.sections.iter())
            .map(|section| section.response(omega).norm())
            .product::<f64>();

        (20.0 * magnitude.max(1e-12).log10()) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::design_chain;
    use crate::params::{ChainSettings, Slope};

    fn settings_with_slopes(low: Slope, high: Slope) -> ChainSettings {
        ChainSettings {
            low_cut_freq: 200.0,
            high_cut_freq: 5_000.0,
            low_cut_slope: low,
            high_cut_slope: high,
            ..ChainSettings::default()
        }
    }

    #[test]
    fn new_chain_passes_audio_through() {
        let mut chain = MonoChain::new();
        let mut block = [0.5, -0.25, 1.0, 0.0];
        chain.process_block(&mut block);
        assert_eq!(block, [0.5, -0.25, 1.0, 0.0]);
        assert_eq!(chain.magnitude_db(1_000.0, 48_000.0), 0.0);
    }

    #[test]
    fn update_activates_one_section_per_slope_step() {
        let mut chain = MonoChain::new();
        for slope in Slope::ALL {
            let coefficients =
                design_chain(&settings_with_slopes(slope, Slope::Db12), 48_000.0).unwrap();
            chain.update(&coefficients);
            assert_eq!(chain.low_cut().active_sections(), slope.sections());
            assert_eq!(chain.high_cut().active_sections(), 1);
            assert!(chain.peak().is_active());
        }
    }

    #[test]
    fn shrinking_slope_bypasses_and_silences_unused_slots() {
        let mut chain = MonoChain::new();
        chain.update(&design_chain(&settings_with_slopes(Slope::Db48, Slope::Db48), 48_000.0).unwrap());

        let mut noise: Vec<f32> = (0..256).map(|n| ((n * 7919) % 97) as f32 / 48.0 - 1.0).collect();
        chain.process_block(&mut noise);

        chain.update(&design_chain(&settings_with_slopes(Slope::Db12, Slope::Db12), 48_000.0).unwrap());
        for stage in [chain.low_cut(), chain.high_cut()] {
            assert_eq!(stage.active_sections(), 1);
            for section in &stage.sections()[1..] {
                assert!(!section.is_active());
                assert_eq!(section.coefficients().b0, 1.0);
                assert_eq!(section.coefficients().a1, 0.0);
            }
        }

        // Bypassed slots must not leak their old ringing into a silent input
        let mut reference = chain;
        reference.low_cut.sections[0].reset();
        reference.peak.reset();
        reference.high_cut.sections[0].reset();
        let mut silence = [0.0f32; 64];
        reference.process_block(&mut silence);
        assert!(silence.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn swap_keeps_active_history() {
        let mut chain = MonoChain::new();
        let coefficients = design_chain(&settings_with_slopes(Slope::Db24, Slope::Db24), 48_000.0).unwrap();
        chain.update(&coefficients);

        let mut block = [1.0f32; 32];
        chain.process_block(&mut block);

        let mut refreshed = chain.clone();
        refreshed.update(&coefficients);

        let mut a = [1.0f32; 32];
        let mut b = [1.0f32; 32];
        chain.process_block(&mut a);
        refreshed.process_block(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn reset_clears_history_only() {
        let mut chain = MonoChain::new();
        chain.update(&design_chain(&settings_with_slopes(Slope::Db36, Slope::Db12), 48_000.0).unwrap());
        let mut block = [1.0f32; 16];
        chain.process_block(&mut block);

        chain.reset();
        assert_eq!(chain.low_cut().active_sections(), 3);

        let mut fresh = MonoChain::new();
        fresh.update(&design_chain(&settings_with_slopes(Slope::Db36, Slope::Db12), 48_000.0).unwrap());

        let mut a = [0.3f32; 16];
        let mut b = [0.3f32; 16];
        chain.process_block(&mut a);
        fresh.process_block(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn magnitude_follows_stages() {
        let settings = ChainSettings {
            peak_freq: 1_000.0,
            peak_gain_db: 12.0,
            ..ChainSettings::default()
        };
        let mut chain = MonoChain::new();
        chain.update(&design_chain(&settings, 48_000.0).unwrap());

        assert!((chain.magnitude_db(1_000.0, 48_000.0) - 12.0).abs() < 0.1);
        assert!(chain.magnitude_db(20.0, 48_000.0) < -2.5);
    }
}
