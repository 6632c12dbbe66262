use atomic_float::AtomicF32;
use nih_plug::prelude::{nih_error, Editor, GuiContext};
use nih_plug_iced::widgets as nih_widgets;
use nih_plug_iced::*;
use std::sync::Arc;

use crate::bridge::{CurvePoller, CurveUpdater, ParamChangeFlag, ResponseCurve, DEFAULT_POLL_RATE_HZ};
use crate::params::ParametricEqParams;

// Window size, persisted with the parameters
pub(crate) fn default_state() -> Arc<IcedState> {
    IcedState::from_size(600, 400)
}

/// Everything the editor needs to keep its own response curve up to date.
pub(crate) struct EditorShared {
    pub params: Arc<ParametricEqParams>,
    pub changed: Arc<ParamChangeFlag>,
    pub sample_rate: Arc<AtomicF32>,
    pub curve: Arc<ResponseCurve>,
}

pub(crate) fn create(
    shared: EditorShared,
    editor_state: Arc<IcedState>,
) -> Option<Box<dyn Editor>> {
    create_iced_editor::<EqEditor>(editor_state, Arc::new(shared))
}

struct EqEditor {
    params: Arc<ParametricEqParams>,
    context: Arc<dyn GuiContext>,

    curve: Arc<ResponseCurve>,
    /// Stops with the editor window.
    _poller: Option<CurvePoller>,

    low_cut_freq_state: nih_widgets::param_slider::State,
    low_cut_slope_state: nih_widgets::param_slider::State,
    peak_freq_state: nih_widgets::param_slider::State,
    peak_gain_state: nih_widgets::param_slider::State,
    peak_quality_state: nih_widgets::param_slider::State,
    high_cut_freq_state: nih_widgets::param_slider::State,
    high_cut_slope_state: nih_widgets::param_slider::State,
}

#[derive(Debug, Clone, Copy)]
enum Message {
    /// Update a parameter's value.
    ParamUpdate(nih_widgets::ParamMessage),
}

impl IcedEditor for EqEditor {
    type Executor = executor::Default;
    type Message = Message;
    type InitializationFlags = Arc<EditorShared>;

    fn new(
        shared: Self::InitializationFlags,
        context: Arc<dyn GuiContext>,
    ) -> (Self, Command<Self::Message>) {
        let updater = CurveUpdater::new(
            shared.params.clone(),
            shared.changed.clone(),
            shared.sample_rate.clone(),
            shared.curve.clone(),
        );
        // Draw the curve once even if nothing moves
        shared.changed.notify();
        let poller = match CurvePoller::spawn(updater, DEFAULT_POLL_RATE_HZ) {
            Ok(poller) => Some(poller),
            Err(err) => {
                nih_error!("Could not start the response curve poller: {err}");
                None
            }
        };

        let editor = EqEditor {
            params: shared.params.clone(),
            context,

            curve: shared.curve.clone(),
            _poller: poller,

            low_cut_freq_state: Default::default(),
            low_cut_slope_state: Default::default(),
            peak_freq_state: Default::default(),
            peak_gain_state: Default::default(),
            peak_quality_state: Default::default(),
            high_cut_freq_state: Default::default(),
            high_cut_slope_state: Default::default(),
        };

        (editor, Command::none())
    }

    fn context(&self) -> &dyn GuiContext {
        self.context.as_ref()
    }

    fn update(
        &mut self,
        _window: &mut WindowQueue,
        message: Self::Message,
    ) -> Command<Self::Message> {
        match message {
            Message::ParamUpdate(message) => self.handle_param_message(message),
        }

        Command::none()
    }

    fn view(&mut self) -> Element<'_, Self::Message> {
        let (min_db, max_db) = self.curve.range_db();

        let low_cut = Column::new()
            .align_items(Alignment::Center)
            .spacing(10)
            .push(
                nih_widgets::ParamSlider::new(&mut self.low_cut_freq_state, &self.params.low_cut_freq)
                    .map(Message::ParamUpdate),
            )
            .push(
                nih_widgets::ParamSlider::new(&mut self.low_cut_slope_state, &self.params.low_cut_slope)
                    .map(Message::ParamUpdate),
            );

        let peak = Column::new()
            .align_items(Alignment::Center)
            .spacing(10)
            .push(
                nih_widgets::ParamSlider::new(&mut self.peak_freq_state, &self.params.peak_freq)
                    .map(Message::ParamUpdate),
            )
            .push(
                nih_widgets::ParamSlider::new(&mut self.peak_gain_state, &self.params.peak_gain)
                    .map(Message::ParamUpdate),
            )
            .push(
                nih_widgets::ParamSlider::new(&mut self.peak_quality_state, &self.params.peak_quality)
                    .map(Message::ParamUpdate),
            );

        let high_cut = Column::new()
            .align_items(Alignment::Center)
            .spacing(10)
            .push(
                nih_widgets::ParamSlider::new(&mut self.high_cut_freq_state, &self.params.high_cut_freq)
                    .map(Message::ParamUpdate),
            )
            .push(
                nih_widgets::ParamSlider::new(&mut self.high_cut_slope_state, &self.params.high_cut_slope)
                    .map(Message::ParamUpdate),
            );

        Column::new()
            .align_items(Alignment::Center)
            .padding(20)
            .spacing(10)
            .push(
                Text::new("Parametric EQ")
                    .font(assets::NOTO_SANS_LIGHT)
                    .size(24)
                    .height(30.into())
                    .width(Length::Fill)
                    .horizontal_alignment(alignment::Horizontal::Center)
                    .vertical_alignment(alignment::Vertical::Bottom),
            )
            .push(
                Text::new(format!("Response {min_db:+.1} dB to {max_db:+.1} dB"))
                    .size(16)
                    .width(Length::Fill)
                    .horizontal_alignment(alignment::Horizontal::Center),
            )
            .push(Space::with_height(10.into()))
            .push(
                Row::new()
                    .spacing(20)
                    .push(low_cut)
                    .push(peak)
                    .push(high_cut),
            )
            .into()
    }

    fn background_color(&self) -> nih_plug_iced::Color {
        nih_plug_iced::Color {
            r: 0.98,
            g: 0.98,
            b: 0.98,
            a: 1.0,
        }
    }
}
