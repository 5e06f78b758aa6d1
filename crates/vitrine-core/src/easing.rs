#![forbid(unsafe_code)]

//! Easing curves over normalized time.
//!
//! Every curve maps `t ∈ [0, 1]` to a value with `f(0) = 0` and `f(1) = 1`.
//! Inputs outside `[0, 1]` are clamped first. `PowerN` follows the usual
//! web-animation naming: power1 is quadratic, power2 cubic, power3 quartic.
//!
//! Only [`Easing::BackOut`] leaves `[0, 1]` in between (it overshoots by
//! design); everything else is monotonic.

/// Direction of a power curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum EaseDirection {
    In,
    Out,
    InOut,
}

/// An easing curve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum Easing {
    #[default]
    Linear,
    /// Polynomial curve of degree `power + 1`.
    Power { power: u8, direction: EaseDirection },
    /// Overshooting ease-out; `overshoot` is the classic back constant (1.70158).
    BackOut { overshoot: f64 },
}

impl Easing {
    pub const POWER1_OUT: Self = Self::power(1, EaseDirection::Out);
    pub const POWER2_IN_OUT: Self = Self::power(2, EaseDirection::InOut);
    pub const POWER2_OUT: Self = Self::power(2, EaseDirection::Out);
    pub const POWER3_IN_OUT: Self = Self::power(3, EaseDirection::InOut);
    pub const POWER3_OUT: Self = Self::power(3, EaseDirection::Out);

    /// Build a power curve.
    #[must_use]
    pub const fn power(power: u8, direction: EaseDirection) -> Self {
        Self::Power { power, direction }
    }

    /// Evaluate the curve at `t`.
    #[must_use]
    pub fn apply(&self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match *self {
            Self::Linear => t,
            Self::Power { power, direction } => {
                let exp = i32::from(power) + 1;
                match direction {
                    EaseDirection::In => t.powi(exp),
                    EaseDirection::Out => 1.0 - (1.0 - t).powi(exp),
                    EaseDirection::InOut => {
                        if t < 0.5 {
                            0.5 * (2.0 * t).powi(exp)
                        } else {
                            1.0 - 0.5 * (2.0 * (1.0 - t)).powi(exp)
                        }
                    }
                }
            }
            Self::BackOut { overshoot } => {
                let s = overshoot;
                let u = t - 1.0;
                u * u * ((s + 1.0) * u + s) + 1.0
            }
        }
    }

    /// Whether the curve stays within `[0, 1]` for all inputs.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        !matches!(self, Self::BackOut { overshoot } if *overshoot > 0.0)
    }
}
