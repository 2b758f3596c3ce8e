//! Mapping of host speech parameters onto engine multipliers
//!
//! The host expresses rate and pitch on a `[-100, 100]` integer scale. Engines take a
//! multiplicative factor where 1.0 is neutral. Positive values grow linearly, negative
//! values follow the reciprocal progression so that `v` and `-v` are inverses.

use crate::engine::PunctuationLevel;
use crate::types::PunctuationMode;

pub const PARAM_MIN: i32 = -100;
pub const PARAM_MAX: i32 = 100;

const RATE_STEP: f32 = 20.0;
const PITCH_STEP: f32 = 50.0;

fn clamp_param(kind: &str, value: i32) -> i32 {
    debug_assert!(
        (PARAM_MIN..=PARAM_MAX).contains(&value),
        "{kind} {value} outside [{PARAM_MIN}, {PARAM_MAX}]"
    );
    if !(PARAM_MIN..=PARAM_MAX).contains(&value) {
        log::warn!("{} {} out of range, clamping", kind, value);
    }
    value.clamp(PARAM_MIN, PARAM_MAX)
}

fn reciprocal_linear(value: i32, step: f32) -> f32 {
    let v = value as f32;
    if value >= 0 {
        1.0 + v / step
    } else {
        1.0 / (1.0 - v / step)
    }
}

/// Speed multiplier for a host rate: 0 -> 1.0, 20 -> 2.0, 100 -> 6.0, -20 -> 1/2, -100 -> 1/6
pub fn rate_to_speed(rate: i32) -> f32 {
    reciprocal_linear(clamp_param("rate", rate), RATE_STEP)
}

/// Pitch multiplier for a host pitch: 0 -> 1.0, 50 -> 2.0, 100 -> 3.0, -50 -> 1/2, -100 -> 1/3
pub fn pitch_to_multiplier(pitch: i32) -> f32 {
    reciprocal_linear(clamp_param("pitch", pitch), PITCH_STEP)
}

pub fn punctuation_level(mode: PunctuationMode) -> PunctuationLevel {
    match mode {
        PunctuationMode::All => PunctuationLevel::All,
        PunctuationMode::Most => PunctuationLevel::Most,
        PunctuationMode::Some => PunctuationLevel::Some,
        PunctuationMode::None => PunctuationLevel::None,
    }
}
