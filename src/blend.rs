//! Alpha blend options used by motion warping.
//!
//! A blend option maps a linear alpha in `[0, 1]` onto an eased alpha. The
//! `Custom` variant carries its own curve, so a custom option can never be
//! selected without the data it needs.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// One key of a [`FloatCurve`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
}

impl CurveKey {
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Piecewise-linear curve. Keys are kept sorted by time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CurveKey>", into = "Vec<CurveKey>")]
pub struct FloatCurve {
    keys: Vec<CurveKey>,
}

impl FloatCurve {
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.retain(|k| k.time.is_finite() && k.value.is_finite());
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sample the curve, holding the first/last value outside the key range.
    /// Returns `None` for a curve without keys.
    pub fn evaluate(&self, time: f32) -> Option<f32> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;

        if time.is_nan() || time <= first.time {
            return Some(first.value);
        }
        if time >= last.time {
            return Some(last.value);
        }

        let upper = self.keys.partition_point(|k| k.time <= time);
        let (a, b) = (self.keys[upper - 1], self.keys[upper]);
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return Some(b.value);
        }
        let t = (time - a.time) / span;
        Some(a.value + (b.value - a.value) * t)
    }
}

impl From<Vec<CurveKey>> for FloatCurve {
    fn from(keys: Vec<CurveKey>) -> Self {
        Self::new(keys)
    }
}

impl From<FloatCurve> for Vec<CurveKey> {
    fn from(curve: FloatCurve) -> Self {
        curve.keys
    }
}

/// Interpolation family for one motion-warping channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlendOption {
    #[default]
    Linear,
    Cubic,
    HermiteCubic,
    Sinusoidal,
    QuadraticInOut,
    CubicInOut,
    QuarticInOut,
    QuinticInOut,
    CircularIn,
    CircularOut,
    CircularInOut,
    ExpIn,
    ExpOut,
    ExpInOut,
    Custom { curve: FloatCurve },
}

impl BlendOption {
    /// Map a linear alpha onto this blend's eased alpha.
    ///
    /// Input is clamped to `[0, 1]`, NaN counts as 0 (a zero-length window
    /// divides 0 by 0). A custom curve without keys blends linearly.
    pub fn alpha(&self, alpha: f32) -> f32 {
        let t = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
        match self {
            BlendOption::Linear => t,
            BlendOption::Cubic => t * t * t,
            BlendOption::HermiteCubic => t * t * (3.0 - 2.0 * t),
            BlendOption::Sinusoidal => ((t * PI - PI / 2.0).sin() + 1.0) / 2.0,
            BlendOption::QuadraticInOut => ease_in_out(t, 2.0),
            BlendOption::CubicInOut => ease_in_out(t, 3.0),
            BlendOption::QuarticInOut => ease_in_out(t, 4.0),
            BlendOption::QuinticInOut => ease_in_out(t, 5.0),
            BlendOption::CircularIn => 1.0 - (1.0 - t * t).sqrt(),
            BlendOption::CircularOut => (1.0 - (t - 1.0) * (t - 1.0)).sqrt(),
            BlendOption::CircularInOut => {
                if t < 0.5 {
                    BlendOption::CircularIn.alpha(t * 2.0) * 0.5
                } else {
                    BlendOption::CircularOut.alpha(t * 2.0 - 1.0) * 0.5 + 0.5
                }
            }
            BlendOption::ExpIn => exp_in(t),
            BlendOption::ExpOut => 1.0 - exp_in(1.0 - t),
            BlendOption::ExpInOut => {
                if t < 0.5 {
                    exp_in(t * 2.0) * 0.5
                } else {
                    (1.0 - exp_in(2.0 - t * 2.0)) * 0.5 + 0.5
                }
            }
            BlendOption::Custom { curve } => curve.evaluate(t).unwrap_or(t),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, BlendOption::Custom { .. })
    }
}

fn ease_in_out(t: f32, exp: f32) -> f32 {
    if t < 0.5 {
        0.5 * (2.0 * t).powf(exp)
    } else {
        1.0 - 0.5 * (2.0 * (1.0 - t)).powf(exp)
    }
}

fn exp_in(t: f32) -> f32 {
    if t <= 0.0 {
        0.0
    } else {
        2.0_f32.powf(10.0 * (t - 1.0))
    }
}
