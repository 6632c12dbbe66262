use nih_plug::prelude::*;

use crate::chain::MonoChain;
use crate::coefficients::{design_chain, DesignError};
use crate::params::ChainSettings;

/// Two independent chains fed with the same coefficients. Each channel keeps its own history.
pub struct EqEngine {
    left: MonoChain,
    right: MonoChain,
    sample_rate: f32,
    max_block_size: usize,
}

impl Default for EqEngine {
    fn default() -> Self {
        Self {
            left: MonoChain::new(),
            right: MonoChain::new(),
            sample_rate: 44_100.0,
            max_block_size: 0,
        }
    }
}

impl EqEngine {
    /// Sets the rate, clears all histories and installs coefficients for `settings`. Must run off
    /// the audio thread, before processing starts or after the rate changes.
    pub fn prepare(
        &mut self,
        sample_rate: f32,
        max_block_size: usize,
        settings: &ChainSettings,
    ) -> Result<(), DesignError> {
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.reset();

        self.refresh_filters(settings)
    }

    /// Designs every stage for `settings` and installs the result into both chains. If any stage
    /// fails nothing is installed and the previous coefficients keep running.
    pub fn refresh_filters(&mut self, settings: &ChainSettings) -> Result<(), DesignError> {
        let coefficients = design_chain(settings, self.sample_rate)?;

        self.left.update(&coefficients);
        self.right.update(&coefficients);

        Ok(())
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    /// Filters both channels in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        nih_debug_assert!(left.len() <= self.max_block_size || self.max_block_size == 0);
        nih_debug_assert_eq!(left.len(), right.len());

        self.left.process_block(left);
        self.right.process_block(right);
    }

    /// Mono layouts only use the left chain.
    pub fn process_mono(&mut self, samples: &mut [f32]) {
        nih_debug_assert!(samples.len() <= self.max_block_size || self.max_block_size == 0);

        self.left.process_block(samples);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn left(&self) -> &MonoChain {
        &self.left
    }

    pub fn right(&self) -> &MonoChain {
        &self.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Slope;
    use crate::section::CoefficientSet;
    use std::f64::consts::PI;

    fn sine(frequency: f32, sample_rate: f32, len: usize, offset: usize) -> Vec<f32> {
        (offset..offset + len)
            .map(|n| (2.0 * PI * frequency as f64 * n as f64 / sample_rate as f64).sin() as f32)
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn gain_db(input: &[f32], output: &[f32]) -> f32 {
        20.0 * (rms(output) / rms(input)).log10()
    }

    fn bits(c: &CoefficientSet) -> [u64; 5] {
        [c.b0, c.b1, c.b2, c.a1, c.a2].map(f64::to_bits)
    }

    /// Feeds a tone block by block, the way a host would, and returns the gain measured over the
    /// final 100 periods.
    fn steady_state_gain(engine: &mut EqEngine, settings: &ChainSettings, frequency: f32) -> f32 {
        let sample_rate = engine.sample_rate();
        let block = 441;
        let blocks = 200;

        let mut last_in = Vec::new();
        let mut last_out = Vec::new();
        for b in 0..blocks {
            let input = sine(frequency, sample_rate, block, b * block);
            let mut left = input.clone();
            let mut right = input.clone();
            engine.refresh_filters(settings).unwrap();
            engine.process(&mut left, &mut right);
            assert_eq!(left, right);

            last_in.extend_from_slice(&input);
            last_out.extend_from_slice(&left);
        }

        let window = (100.0 * sample_rate / frequency) as usize;
        let start = last_in.len() - window;
        gain_db(&last_in[start..], &last_out[start..])
    }

    #[test]
    fn defaults_pass_a_full_scale_tone() {
        let settings = ChainSettings::default();
        let mut engine = EqEngine::default();
        engine.prepare(44_100.0, 512, &settings).unwrap();

        let gain = steady_state_gain(&mut engine, &settings, 750.0);
        assert!(gain.abs() < 0.05, "{gain} dB");
    }

    #[test]
    fn peak_boost_reaches_full_gain() {
        let settings = ChainSettings {
            peak_freq: 1_000.0,
            peak_gain_db: 24.0,
            peak_quality: 1.0,
            ..ChainSettings::default()
        };
        let mut engine = EqEngine::default();
        engine.prepare(44_100.0, 512, &settings).unwrap();
        let at_centre = steady_state_gain(&mut engine, &settings, 1_000.0);
        assert!((at_centre - 24.0).abs() < 0.5, "{at_centre} dB");

        engine.prepare(44_100.0, 512, &settings).unwrap();
        let decade_up = steady_state_gain(&mut engine, &settings, 10_000.0);
        assert!(decade_up < 3.0, "{decade_up} dB");
    }

    #[test]
    fn refresh_twice_installs_identical_coefficients() {
        let settings = ChainSettings {
            low_cut_freq: 120.0,
            high_cut_freq: 12_000.0,
            peak_freq: 3_000.0,
            peak_gain_db: 4.5,
            peak_quality: 0.7,
            low_cut_slope: Slope::Db48,
            high_cut_slope: Slope::Db36,
        };
        let mut engine = EqEngine::default();
        engine.prepare(48_000.0, 256, &settings).unwrap();

        engine.refresh_filters(&settings).unwrap();
        let first = engine.left().clone();
        engine.refresh_filters(&settings).unwrap();
        let second = engine.left();

        assert_eq!(bits(first.peak().coefficients()), bits(second.peak().coefficients()));
        for stage in [
            (first.low_cut(), second.low_cut()),
            (first.high_cut(), second.high_cut()),
        ] {
            for (a, b) in stage.0.sections().iter().zip(stage.1.sections()) {
                assert_eq!(bits(a.coefficients()), bits(b.coefficients()));
            }
        }
        assert_eq!(
            bits(engine.left().peak().coefficients()),
            bits(engine.right().peak().coefficients())
        );
    }

    #[test]
    fn failed_refresh_keeps_previous_coefficients() {
        let good = ChainSettings {
            peak_gain_db: 6.0,
            ..ChainSettings::default()
        };
        let mut engine = EqEngine::default();
        engine.prepare(48_000.0, 256, &good).unwrap();
        let before = bits(engine.left().peak().coefficients());

        let bad = ChainSettings {
            peak_quality: f32::NAN,
            low_cut_slope: Slope::Db48,
            ..good
        };
        assert!(engine.refresh_filters(&bad).is_err());

        assert_eq!(bits(engine.left().peak().coefficients()), before);
        assert_eq!(engine.left().low_cut().active_sections(), 1);
        assert_eq!(engine.right().low_cut().active_sections(), 1);
    }

    #[test]
    fn prepares_at_very_high_sample_rates() {
        let corner = ChainSettings {
            low_cut_slope: Slope::Db48,
            high_cut_slope: Slope::Db48,
            peak_gain_db: 24.0,
            peak_quality: 0.1,
            ..ChainSettings::default()
        };
        for sample_rate in [384_000.0, 768_000.0] {
            for settings in [ChainSettings::default(), corner] {
                let mut engine = EqEngine::default();
                assert_eq!(engine.prepare(sample_rate, 512, &settings), Ok(()));

                let mut left = vec![1.0f32; 512];
                let mut right = vec![0.0f32; 512];
                engine.process(&mut left, &mut right);
                assert!(left.iter().all(|s| s.is_finite()));
            }
        }
    }

    #[test]
    fn coefficient_swap_is_glitch_continuous() {
        let sample_rate = 44_100.0;
        let frequency = 1_000.0;
        let block = 512;
        let old = ChainSettings {
            peak_freq: frequency,
            ..ChainSettings::default()
        };
        let new = ChainSettings {
            peak_gain_db: 1.0,
            ..old
        };

        let mut engine = EqEngine::default();
        engine.prepare(sample_rate, block, &old).unwrap();

        // Settle on the old response
        let mut output = Vec::new();
        for b in 0..40 {
            let mut left = sine(frequency, sample_rate, block, b * block);
            let mut right = left.clone();
            engine.process(&mut left, &mut right);
            output = left;
        }
        let old_steady_step = output
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0f32, f32::max);
        let boundary_prev = output[block - 1];

        engine.refresh_filters(&new).unwrap();
        let mut left = sine(frequency, sample_rate, block, 40 * block);
        let mut right = left.clone();
        engine.process(&mut left, &mut right);

        let new_amplitude = 10f32.powf(1.0 / 20.0);
        let bound = old_steady_step * new_amplitude + (new_amplitude - 1.0);
        assert!(
            (left[0] - boundary_prev).abs() <= bound,
            "jump {} over bound {bound}",
            (left[0] - boundary_prev).abs()
        );
        for w in left.windows(2) {
            assert!((w[1] - w[0]).abs() <= bound);
        }
    }

    #[test]
    fn channels_keep_separate_history() {
        let settings = ChainSettings {
            low_cut_freq: 500.0,
            low_cut_slope: Slope::Db24,
            ..ChainSettings::default()
        };
        let mut engine = EqEngine::default();
        engine.prepare(48_000.0, 64, &settings).unwrap();

        let mut left = vec![1.0f32; 64];
        let mut right = vec![0.0f32; 64];
        engine.process(&mut left, &mut right);

        assert!(right.iter().all(|&s| s == 0.0));
        assert!(left.iter().any(|&s| s != 1.0));
    }

    #[test]
    fn prepare_resets_history() {
        let settings = ChainSettings {
            peak_gain_db: 12.0,
            ..ChainSettings::default()
        };
        let mut engine = EqEngine::default();
        engine.prepare(48_000.0, 64, &settings).unwrap();

        let mut left = vec![1.0f32; 64];
        let mut right = vec![1.0f32; 64];
        engine.process(&mut left, &mut right);

        engine.prepare(96_000.0, 64, &settings).unwrap();
        let mut left = vec![0.0f32; 64];
        let mut right = vec![0.0f32; 64];
        engine.process(&mut left, &mut right);
        assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));
        assert_eq!(engine.sample_rate(), 96_000.0);
    }

    #[test]
    fn mono_uses_left_chain_only() {
        let settings = ChainSettings {
            peak_gain_db: -12.0,
            ..ChainSettings::default()
        };
        let mut engine = EqEngine::default();
        engine.prepare(48_000.0, 128, &settings).unwrap();

        let mut mono = sine(750.0, 48_000.0, 128, 0);
        engine.process_mono(&mut mono);

        // Only the left chain carries the tone's history afterwards
        let mut left = vec![0.0f32; 128];
        let mut right = vec![0.0f32; 128];
        engine.process(&mut left, &mut right);
        assert!(right.iter().all(|&s| s == 0.0));
        assert!(left.iter().any(|&s| s != 0.0));
    }
}
