use atomic_float::AtomicF32;
use nih_plug::prelude::*;
use nih_plug::wrapper::state::PluginState;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub mod bridge;
pub mod chain;
pub mod coefficients;
mod editor;
pub mod engine;
pub mod params;
pub mod section;
pub mod state;

use bridge::{ParamChangeFlag, ResponseCurve};
use engine::EqEngine;
use params::{ParametricEqParams, SettingsSource};

/// Low cut, bell and high cut per channel. Coefficients are recomputed at the start of every
/// block so parameter changes land with at most one block of latency.
pub struct ParametricEq {
    params: Arc<ParametricEqParams>,
    engine: EqEngine,

    /// Raised by every parameter edit, consumed by the editor's curve poller.
    params_changed: Arc<ParamChangeFlag>,
    /// Shared with the editor so its curve is drawn for the rate the host runs at.
    sample_rate: Arc<AtomicF32>,
    curve: Arc<ResponseCurve>,
}

impl Default for ParametricEq {
    fn default() -> Self {
        let params_changed = Arc::new(ParamChangeFlag::default());

        Self {
            params: Arc::new(ParametricEqParams::new(params_changed.clone())),
            engine: EqEngine::default(),

            params_changed,
            sample_rate: Arc::new(AtomicF32::new(44_100.0)),
            curve: Arc::new(ResponseCurve::default()),
        }
    }
}

impl Plugin for ParametricEq {
    const NAME: &'static str = "Parametric EQ";
    const VENDOR: &'static str = "Kakeru3";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";

    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            ..AudioIOLayout::const_default()
        },
    ];

    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn editor(&mut self, _async_executor: AsyncExecutor<Self>) -> Option<Box<dyn Editor>> {
        editor::create(
            editor::EditorShared {
                params: self.params.clone(),
                changed: self.params_changed.clone(),
                sample_rate: self.sample_rate.clone(),
                curve: self.curve.clone(),
            },
            self.params.editor_state.clone(),
        )
    }

    /// Restored states that the parameters could never have produced are dropped as a whole so the
    /// previous values stay in place.
    fn filter_state(restored: &mut PluginState) {
        if let Err(err) = state::validate(restored) {
            nih_warn!("Not applying restored state: {err}");
            restored.params.clear();
        }
    }

    /// Also runs after the host restores a state, which is what brings the filters in line with
    /// the restored parameters before the next block.
    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let sample_rate = buffer_config.sample_rate;
        let settings = self.params.chain_settings();

        if let Err(err) = self.engine.prepare(
            sample_rate,
            buffer_config.max_buffer_size as usize,
            &settings,
        ) {
            nih_error!("Could not design filters at {sample_rate} Hz: {err}");
            return false;
        }

        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.params_changed.notify();
        nih_log!("Prepared for {sample_rate} Hz, blocks of up to {}", buffer_config.max_buffer_size);

        true
    }

    fn reset(&mut self) {
        self.engine.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        let settings = self.params.chain_settings();
        if let Err(err) = self.engine.refresh_filters(&settings) {
            nih_debug_assert_failure!("Keeping the previous filters: {}", err);
        }

        match buffer.as_slice() {
            [left, right, ..] => self.engine.process(left, right),
            [mono] => self.engine.process_mono(mono),
            [] => (),
        }

        ProcessStatus::Normal
    }
}

impl ClapPlugin for ParametricEq {
    const CLAP_ID: &'static str = "com.kakeru3.parametric-eq";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Low cut, peak and high cut equalizer");
    const CLAP_MANUAL_URL: Option<&'static str> = Some(Self::URL);
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Equalizer,
        ClapFeature::Stereo,
        ClapFeature::Mono,
    ];
}

impl Vst3Plugin for ParametricEq {
    const VST3_CLASS_ID: [u8; 16] = *b"Kakeru3ParamEqAA";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Eq];
}

nih_export_clap!(ParametricEq);
nih_export_vst3!(ParametricEq);
