use nih_plug::prelude::*;
use nih_plug_iced::IcedState;
use std::sync::Arc;

use crate::bridge::ParamChangeFlag;
use crate::editor;

pub const LOW_CUT_FREQ_ID: &str = "lowcut_freq";
pub const HIGH_CUT_FREQ_ID: &str = "highcut_freq";
pub const PEAK_FREQ_ID: &str = "peak_freq";
pub const PEAK_GAIN_ID: &str = "peak_gain";
pub const PEAK_QUALITY_ID: &str = "peak_quality";
pub const LOW_CUT_SLOPE_ID: &str = "lowcut_slope";
pub const HIGH_CUT_SLOPE_ID: &str = "highcut_slope";

pub const MIN_FREQUENCY: f32 = 20.0;
pub const MAX_FREQUENCY: f32 = 20_000.0;
pub const MIN_GAIN_DB: f32 = -24.0;
pub const MAX_GAIN_DB: f32 = 24.0;
pub const MIN_QUALITY: f32 = 0.1;
pub const MAX_QUALITY: f32 = 10.0;

/// Roll-off of a cut filter. Each step adds one more second-order section.
#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slope {
    #[id = "12"]
    #[name = "12 dB/Oct"]
    Db12,
    #[id = "24"]
    #[name = "24 dB/Oct"]
    Db24,
    #[id = "36"]
    #[name = "36 dB/Oct"]
    Db36,
    #[id = "48"]
    #[name = "48 dB/Oct"]
    Db48,
}

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48];

    pub fn ordinal(self) -> usize {
        match self {
            Slope::Db12 => 0,
            Slope::Db24 => 1,
            Slope::Db36 => 2,
            Slope::Db48 => 3,
        }
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    /// Butterworth order, always even.
    pub fn order(self) -> usize {
        (self.ordinal() + 1) * 2
    }

    pub fn sections(self) -> usize {
        self.ordinal() + 1
    }
}

/// Plain numbers read out of the parameters at one instant. Pulled whenever coefficients are
/// recomputed and never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_quality: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            low_cut_freq: MIN_FREQUENCY,
            high_cut_freq: MAX_FREQUENCY,
            peak_freq: 750.0,
            peak_gain_db: 0.0,
            peak_quality: 1.0,
            low_cut_slope: Slope::Db12,
            high_cut_slope: Slope::Db12,
        }
    }
}

/// Anything that can hand out the current [`ChainSettings`] without blocking.
pub trait SettingsSource: Send + Sync {
    fn chain_settings(&self) -> ChainSettings;
}

#[derive(Params)]
pub struct ParametricEqParams {
    #[persist = "editor-state"]
    pub editor_state: Arc<IcedState>,

    #[id = "lowcut_freq"]
    pub low_cut_freq: FloatParam,
    #[id = "highcut_freq"]
    pub high_cut_freq: FloatParam,
    #[id = "peak_freq"]
    pub peak_freq: FloatParam,
    #[id = "peak_gain"]
    pub peak_gain: FloatParam,
    #[id = "peak_quality"]
    pub peak_quality: FloatParam,
    #[id = "lowcut_slope"]
    pub low_cut_slope: EnumParam<Slope>,
    #[id = "highcut_slope"]
    pub high_cut_slope: EnumParam<Slope>,
}

impl ParametricEqParams {
    /// Every parameter reports its edits to `changed`, from whichever thread the edit lands on.
    pub fn new(changed: Arc<ParamChangeFlag>) -> Self {
        let defaults = ChainSettings::default();

        Self {
            editor_state: editor::default_state(),

            low_cut_freq: frequency_param("LowCut Freq", defaults.low_cut_freq)
                .with_callback(notify_on_change(&changed)),
            high_cut_freq: frequency_param("HighCut Freq", defaults.high_cut_freq)
                .with_callback(notify_on_change(&changed)),
            peak_freq: frequency_param("Peak Freq", defaults.peak_freq)
                .with_callback(notify_on_change(&changed)),

            peak_gain: FloatParam::new(
                "Peak Gain",
                defaults.peak_gain_db,
                FloatRange::Linear {
                    min: MIN_GAIN_DB,
                    max: MAX_GAIN_DB,
                },
            )
            .with_step_size(0.5)
            .with_unit(" dB")
            .with_value_to_string(formatters::v2s_f32_rounded(1))
            .with_callback(notify_on_change(&changed)),

            peak_quality: FloatParam::new(
                "Peak Quality",
                defaults.peak_quality,
                FloatRange::Linear {
                    min: MIN_QUALITY,
                    max: MAX_QUALITY,
                },
            )
            .with_step_size(0.05)
            .with_value_to_string(formatters::v2s_f32_rounded(2))
            .with_callback(notify_on_change(&changed)),

            low_cut_slope: EnumParam::new("LowCut Slope", defaults.low_cut_slope)
                .with_callback(notify_on_change(&changed)),
            high_cut_slope: EnumParam::new("HighCut Slope", defaults.high_cut_slope)
                .with_callback(notify_on_change(&changed)),
        }
    }
}

impl Default for ParametricEqParams {
    fn default() -> Self {
        Self::new(Arc::new(ParamChangeFlag::default()))
    }
}

impl SettingsSource for ParametricEqParams {
    /// Unsmoothed values, each one a single atomic load.
    fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            low_cut_freq: self.low_cut_freq.value(),
            high_cut_freq: self.high_cut_freq.value(),
            peak_freq: self.peak_freq.value(),
            peak_gain_db: self.peak_gain.value(),
            peak_quality: self.peak_quality.value(),
            low_cut_slope: self.low_cut_slope.value(),
            high_cut_slope: self.high_cut_slope.value(),
        }
    }
}

fn frequency_param(name: &str, default: f32) -> FloatParam {
    FloatParam::new(
        name,
        default,
        FloatRange::Skewed {
            min: MIN_FREQUENCY,
            max: MAX_FREQUENCY,
            factor: FloatRange::skew_factor(-2.0),
        },
    )
    .with_step_size(1.0)
    .with_value_to_string(formatters::v2s_f32_hz_then_khz(1))
    .with_string_to_value(formatters::s2v_f32_hz_then_khz())
}

fn notify_on_change<T: 'static>(changed: &Arc<ParamChangeFlag>) -> Arc<dyn Fn(T) + Send + Sync> {
    let changed = changed.clone();
    Arc::new(move |_: T| changed.notify())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_maps_to_even_orders() {
        let orders: Vec<usize> = Slope::ALL.iter().map(|slope| slope.order()).collect();
        assert_eq!(orders, vec![2, 4, 6, 8]);
    }

    #[test]
    fn slope_ordinal_roundtrip() {
        for slope in Slope::ALL {
            assert_eq!(Slope::from_ordinal(slope.ordinal()), Some(slope));
        }
        assert_eq!(Slope::from_ordinal(4), None);
    }

    #[test]
    fn default_params_snapshot_matches_default_settings() {
        let params = ParametricEqParams::default();
        assert_eq!(params.chain_settings(), ChainSettings::default());
    }
}
