//! Keeps a response curve in step with the parameters, away from the audio thread.
//!
//! Parameter callbacks only raise [`ParamChangeFlag`]. A [`CurvePoller`] thread consumes the flag
//! at a fixed rate and, when it was raised, recomputes the curve from a fresh snapshot using its
//! own [`MonoChain`]. Edits landing between two polls collapse into one refresh.

use atomic_float::AtomicF32;
use crossbeam::channel::{self, select, Sender};
use nih_plug::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::chain::MonoChain;
use crate::coefficients::{design_chain, DesignError};
use crate::params::{SettingsSource, MAX_FREQUENCY, MIN_FREQUENCY};

pub const DEFAULT_POLL_RATE_HZ: f32 = 60.0;
pub const CURVE_POINTS: usize = 128;

/// Set from any thread when a parameter moves, cleared only by the poller.
#[derive(Debug, Default)]
pub struct ParamChangeFlag {
    changed: AtomicBool,
}

impl ParamChangeFlag {
    pub fn notify(&self) {
        self.changed.store(true, Ordering::Release);
    }

    /// Returns `true` at most once per raised flag.
    pub fn take(&self) -> bool {
        self.changed
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Magnitude response in dB at fixed, log-spaced frequencies between 20 Hz and 20 kHz.
pub struct ResponseCurve {
    frequencies: [f32; CURVE_POINTS],
    magnitudes_db: [AtomicF32; CURVE_POINTS],
}

impl Default for ResponseCurve {
    fn default() -> Self {
        let span = MAX_FREQUENCY / MIN_FREQUENCY;
        Self {
            frequencies: std::array::from_fn(|i| {
                MIN_FREQUENCY * span.powf(i as f32 / (CURVE_POINTS - 1) as f32)
            }),
            magnitudes_db: std::array::from_fn(|_| AtomicF32::new(0.0)),
        }
    }
}

impl ResponseCurve {
    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    /// Lowest and highest point of the curve.
    pub fn range_db(&self) -> (f32, f32) {
        self.magnitudes_db
            .iter()
            .map(|m| m.load(Ordering::Relaxed))
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), m| {
                (lo.min(m), hi.max(m))
            })
    }

    fn store_from(&self, chain: &MonoChain, sample_rate: f32) {
        for (frequency, magnitude) in self.frequencies.iter().zip(self.magnitudes_db.iter()) {
            // Points past Nyquist are pinned to the last representable frequency
            let frequency = frequency.min(sample_rate * 0.5);
            magnitude.store(chain.magnitude_db(frequency, sample_rate), Ordering::Relaxed);
        }
    }
}

/// The work one poll does. Owns a chain that only ever feeds the curve.
pub struct CurveUpdater<S: SettingsSource> {
    source: Arc<S>,
    changed: Arc<ParamChangeFlag>,
    sample_rate: Arc<AtomicF32>,
    curve: Arc<ResponseCurve>,
    chain: MonoChain,
}

impl<S: SettingsSource> CurveUpdater<S> {
    pub fn new(
        source: Arc<S>,
        changed: Arc<ParamChangeFlag>,
        sample_rate: Arc<AtomicF32>,
        curve: Arc<ResponseCurve>,
    ) -> Self {
        Self {
            source,
            changed,
            sample_rate,
            curve,
            chain: MonoChain::new(),
        }
    }

    /// Consumes the change flag and recomputes the curve if it was raised. Returns whether the
    /// curve was redrawn.
    pub fn poll(&mut self) -> bool {
        if !self.changed.take() {
            return false;
        }

        match self.refresh() {
            Ok(()) => {
                nih_trace!("Response curve refreshed");
                true
            }
            Err(err) => {
                nih_warn!("Keeping the previous response curve: {err}");
                false
            }
        }
    }

    fn refresh(&mut self) -> Result<(), DesignError> {
        let settings = self.source.chain_settings();
        let sample_rate = self.sample_rate.load(Ordering::Relaxed);

        let coefficients = design_chain(&settings, sample_rate)?;
        self.chain.update(&coefficients);
        self.curve.store_from(&self.chain, sample_rate);

        Ok(())
    }
}

/// Runs a [`CurveUpdater`] on its own thread at a fixed rate. Dropping the poller stops the thread
/// and waits for it.
pub struct CurvePoller {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CurvePoller {
    pub fn spawn<S: SettingsSource + 'static>(
        mut updater: CurveUpdater<S>,
        rate_hz: f32,
    ) -> std::io::Result<Self> {
        let period = Duration::from_secs_f32(1.0 / rate_hz.max(1.0));
        let (stop, stopped) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("eq-curve-poller".into())
            .spawn(move || {
                let ticker = channel::tick(period);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            updater.poll();
                        }
                        recv(stopped) -> _ => break,
                    }
                }
            })?;

        nih_log!("Response curve poller running at {rate_hz} Hz");
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }
}

impl Drop for CurvePoller {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the thread up
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                nih_error!("Response curve poller panicked");
            }
        }
    }
}
