use std::fmt;

/// Speech rate multiplier, always inside `[SpeechRate::MIN, SpeechRate::MAX]`.
///
/// Out-of-range values are clamped rather than rejected so clients can send
/// whatever their slider produces.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SpeechRate(f32);

impl SpeechRate {
    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 2.0;
    pub const DEFAULT: f32 = 1.0;

    /// Clamp `value` into the supported range. NaN maps to the default rate;
    /// infinities clamp like any other out-of-range value.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(Self::DEFAULT);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    /// Same as [`SpeechRate::new`] for JSON numbers, which may not fit in an `f32`.
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self(Self::DEFAULT);
        }
        Self(value.clamp(f64::from(Self::MIN), f64::from(Self::MAX)) as f32)
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for SpeechRate {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl From<f32> for SpeechRate {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for SpeechRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
