use nih_plug::prelude::Enum;
use nih_plug::wrapper::state::{ParamValue, PluginState};
use thiserror::Error;

use crate::params::{
    Slope, HIGH_CUT_FREQ_ID, HIGH_CUT_SLOPE_ID, LOW_CUT_FREQ_ID, LOW_CUT_SLOPE_ID, MAX_FREQUENCY,
    MAX_GAIN_DB, MAX_QUALITY, MIN_FREQUENCY, MIN_GAIN_DB, MIN_QUALITY, PEAK_FREQ_ID, PEAK_GAIN_ID,
    PEAK_QUALITY_ID,
};

#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("parameter '{id}' is out of range: {value}")]
    OutOfRange { id: String, value: f32 },
    #[error("parameter '{id}' names an unknown slope: {value}")]
    UnknownSlope { id: String, value: String },
    #[error("parameter '{id}' has the wrong type")]
    WrongType { id: String },
}

/// Checks every EQ value in a restored state. Values that are missing are fine, the host keeps the
/// current ones; anything present must be something the parameters could have produced.
pub fn validate(state: &PluginState) -> Result<(), StateError> {
    for (id, value) in &state.params {
        match id.as_str() {
            LOW_CUT_FREQ_ID | HIGH_CUT_FREQ_ID | PEAK_FREQ_ID => {
                check_float(id, value, MIN_FREQUENCY, MAX_FREQUENCY)?
            }
            PEAK_GAIN_ID => check_float(id, value, MIN_GAIN_DB, MAX_GAIN_DB)?,
            PEAK_QUALITY_ID => check_float(id, value, MIN_QUALITY, MAX_QUALITY)?,
            LOW_CUT_SLOPE_ID | HIGH_CUT_SLOPE_ID => check_slope(id, value)?,
            _ => (),
        }
    }

    Ok(())
}

fn check_float(id: &str, value: &ParamValue, min: f32, max: f32) -> Result<(), StateError> {
    match value {
        ParamValue::F32(v) if v.is_finite() && (min..=max).contains(v) => Ok(()),
        ParamValue::F32(v) => Err(StateError::OutOfRange {
            id: id.to_owned(),
            value: *v,
        }),
        _ => Err(StateError::WrongType { id: id.to_owned() }),
    }
}

/// Enum parameters are stored either by stable id or by index.
fn check_slope(id: &str, value: &ParamValue) -> Result<(), StateError> {
    match value {
        ParamValue::I32(index) if usize::try_from(*index).ok().and_then(Slope::from_ordinal).is_some() => {
            Ok(())
        }
        ParamValue::String(name) if Slope::ids().is_some_and(|ids| ids.contains(&name.as_str())) => {
            Ok(())
        }
        ParamValue::I32(index) => Err(StateError::UnknownSlope {
            id: id.to_owned(),
            value: index.to_string(),
        }),
        ParamValue::String(name) => Err(StateError::UnknownSlope {
            id: id.to_owned(),
            value: name.clone(),
        }),
        _ => Err(StateError::WrongType { id: id.to_owned() }),
    }
}
