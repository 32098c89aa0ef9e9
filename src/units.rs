//! Conversion of the diffraction axis between scattering angle, momentum transfer and
//! lattice spacing, and tick placement for axes shown in a non-linear unit.
//!
//! All conversions pivot through the scattering angle 2θ (degrees). The wavelength is given
//! in the same length unit as the lattice spacing (e.g. Å, giving q in Å⁻¹).

use ndarray::Array1;
use num_traits::{Float, FloatConst};
use std::fmt::{Display, Formatter};

/// Units of the diffraction axis.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Unit {
    /// Full scattering angle 2θ in degrees.
    Angle,
    /// Momentum transfer q = 4π sin(θ) / λ.
    MomentumTransfer,
    /// Lattice spacing d = λ / (2 sin θ).
    LatticeSpacing,
}

impl Unit {
    /// Parses the unit tags used by the reduction tool (`2th_deg`, `q_A^-1`, `d_A`).
    pub fn from_tag(tag: &str) -> Option<Unit> {
        match tag {
            "2th_deg" => Some(Unit::Angle),
            "q_A^-1" => Some(Unit::MomentumTransfer),
            "d_A" => Some(Unit::LatticeSpacing),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Unit::Angle => "2th_deg",
            Unit::MomentumTransfer => "q_A^-1",
            Unit::LatticeSpacing => "d_A",
        }
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Angle => {
                write!(f, "2θ (°)")
            }
            Unit::MomentumTransfer => {
                write!(f, "Q (A⁻¹)")
            }
            Unit::LatticeSpacing => {
                write!(f, "d (A)")
            }
        }
    }
}

fn to_angle<T: Float + FloatConst>(value: T, from: Unit, wavelength: T) -> T {
    let two = T::one() + T::one();
    let four = two + two;
    let half_turn = T::from(180.0).unwrap_or_else(T::nan);
    match from {
        Unit::Angle => value,
        Unit::MomentumTransfer => {
            two * (value * wavelength / (four * T::PI())).asin() * half_turn / T::PI()
        }
        Unit::LatticeSpacing => two * (wavelength / (two * value)).asin() * half_turn / T::PI(),
    }
}

fn from_angle<T: Float + FloatConst>(tth: T, to: Unit, wavelength: T) -> T {
    let two = T::one() + T::one();
    let four = two + two;
    let half_turn = T::from(180.0).unwrap_or_else(T::nan);
    let theta = tth / two * T::PI() / half_turn;
    match to {
        Unit::Angle => tth,
        Unit::MomentumTransfer => four * T::PI() * theta.sin() / wavelength,
        Unit::LatticeSpacing => wavelength / (two * theta.sin()),
    }
}

/// Converts a single axis value between units.
///
/// Invalid wavelengths (λ ≤ 0) and values outside the domain of `asin` are not treated
/// specially and produce NaN or infinity.
///
/// # Example
/// ```
/// use pattern_engine::units::{convert, Unit};
///
/// let q = convert(30.0_f64, Unit::Angle, Unit::MomentumTransfer, 1.5);
/// assert!((q - 2.1676).abs() < 1e-3);
/// ```
pub fn convert<T: Float + FloatConst>(value: T, from: Unit, to: Unit, wavelength: T) -> T {
    from_angle(to_angle(value, from, wavelength), to, wavelength)
}

/// Element-wise [`convert`] over an array.
pub fn convert_array(values: &Array1<f64>, from: Unit, to: Unit, wavelength: f64) -> Array1<f64> {
    values.mapv(|v| convert(v, from, to, wavelength))
}

/// Converts between unit tags as stored by the reduction tool.
///
/// An unknown tag does not fail: the result is `0.0` and a warning is logged. Callers are
/// expected to validate tags with [`Unit::from_tag`] beforehand.
pub fn convert_tagged(value: f64, from: &str, to: &str, wavelength: f64) -> f64 {
    let tth = match Unit::from_tag(from) {
        Some(unit) => to_angle(value, unit, wavelength),
        None => {
            log::warn!("unknown unit tag {from:?}, conversion falls back to 0");
            0.0
        }
    };
    match Unit::from_tag(to) {
        Some(unit) => from_angle(tth, unit, wavelength),
        None => {
            log::warn!("unknown unit tag {to:?}, conversion falls back to 0");
            0.0
        }
    }
}

/// A labelled tick on an axis laid out linearly in a base unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    /// Position on the axis, in the base unit.
    pub position: f64,
    /// Tick value in the display unit.
    pub value: f64,
    pub label: String,
}

/// Places `n_ticks` rounded ticks of `tick_unit` on an axis spanning `[min, max]` in `base_unit`.
///
/// Both bounds are converted into `tick_unit`, the span is divided into `n_ticks` equal
/// steps and each tick value is rounded to `|round(log10 |step|)| + 1` decimals so the
/// labels stay readable. Ticks run from the converted `min` towards the converted `max`,
/// which for q and d can be a descending sequence. A degenerate span yields no ticks.
pub fn axis_ticks(
    min: f64,
    max: f64,
    tick_unit: Unit,
    base_unit: Unit,
    wavelength: f64,
    n_ticks: usize,
) -> Vec<Tick> {
    let start = convert(min, base_unit, tick_unit, wavelength);
    let end = convert(max, base_unit, tick_unit, wavelength);
    if n_ticks == 0 || !start.is_finite() || !end.is_finite() || start == end {
        return vec![];
    }
    let step = (end - start) / n_ticks as f64;
    let decimals = step.abs().log10().round().abs() as i32 + 1;
    let factor = 10f64.powi(decimals);

    (1..=n_ticks)
        .map(|k| {
            let value = ((start + step * k as f64) * factor).round() / factor;
            Tick {
                position: convert(value, tick_unit, base_unit, wavelength),
                value,
                label: format!("{:.*}", decimals.max(0) as usize, value),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_angle_to_q_reference_value() {
        let q = convert(30.0, Unit::Angle, Unit::MomentumTransfer, 1.5);
        let expected = 4.0 * std::f64::consts::PI * 15f64.to_radians().sin() / 1.5;
        assert_abs_diff_eq!(q, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(q, 2.1683, epsilon = 1e-4);
        let back = convert(q, Unit::MomentumTransfer, Unit::Angle, 1.5);
        assert_abs_diff_eq!(back, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_conversions_are_self_inverse() {
        for wavelength in [0.3344, 0.7107, 1.5406] {
            for tth in [0.5, 5.0, 30.0, 90.0, 150.0, 179.0] {
                let q = convert(tth, Unit::Angle, Unit::MomentumTransfer, wavelength);
                let d = convert(tth, Unit::Angle, Unit::LatticeSpacing, wavelength);
                assert_abs_diff_eq!(
                    convert(q, Unit::MomentumTransfer, Unit::Angle, wavelength),
                    tth,
                    epsilon = 1e-8
                );
                assert_abs_diff_eq!(
                    convert(d, Unit::LatticeSpacing, Unit::Angle, wavelength),
                    tth,
                    epsilon = 1e-8
                );
            }
        }
    }

    #[test]
    fn test_q_and_d_are_reciprocal() {
        // d = 2π / q for every angle
        let q = convert(42.0, Unit::Angle, Unit::MomentumTransfer, 0.4);
        let d = convert(q, Unit::MomentumTransfer, Unit::LatticeSpacing, 0.4);
        assert_abs_diff_eq!(d * q, 2.0 * std::f64::consts::PI, epsilon = 1e-9);
    }

    #[test]
    fn test_identity_for_angle() {
        assert_eq!(convert(12.5, Unit::Angle, Unit::Angle, 0.5), 12.5);
    }

    #[test]
    fn test_single_precision() {
        let q = convert(30.0_f32, Unit::Angle, Unit::MomentumTransfer, 1.5_f32);
        assert_abs_diff_eq!(q, 2.1676_f32, epsilon = 1e-3);
    }

    #[test]
    fn test_array_conversion_matches_scalar() {
        let tth = Array1::<f64>::linspace(1.0, 40.0, 7);
        let d = convert_array(&tth, Unit::Angle, Unit::LatticeSpacing, 0.31);
        for (t, d) in tth.iter().zip(d.iter()) {
            assert_eq!(*d, convert(*t, Unit::Angle, Unit::LatticeSpacing, 0.31));
        }
    }

    #[test]
    fn test_invalid_wavelength_is_not_special_cased() {
        assert!(!convert(30.0, Unit::Angle, Unit::MomentumTransfer, 0.0).is_finite());
    }

    #[test]
    fn test_unknown_tag_falls_back_to_zero() {
        // questionable but preserved: unknown tags are silently zero
        assert_eq!(convert_tagged(12.0, "2th_deg", "chi_deg", 0.3), 0.0);
        assert_eq!(convert_tagged(12.0, "r_mm", "2th_deg", 0.3), 0.0);
        assert_abs_diff_eq!(
            convert_tagged(12.0, "2th_deg", "q_A^-1", 0.3),
            convert(12.0, Unit::Angle, Unit::MomentumTransfer, 0.3),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_tag_round_trip() {
        for unit in [Unit::Angle, Unit::MomentumTransfer, Unit::LatticeSpacing] {
            assert_eq!(Unit::from_tag(unit.tag()), Some(unit));
        }
    }

    #[test]
    fn test_d_ticks_map_back_into_the_axis() {
        let ticks = axis_ticks(5.0, 25.0, Unit::LatticeSpacing, Unit::Angle, 0.4, 8);
        assert_eq!(ticks.len(), 8);
        // d decreases with 2θ, so tick values descend while positions ascend
        for pair in ticks.windows(2) {
            assert!(pair[1].value < pair[0].value);
            assert!(pair[1].position > pair[0].position);
        }
        for tick in &ticks {
            assert_abs_diff_eq!(
                convert(tick.position, Unit::Angle, Unit::LatticeSpacing, 0.4),
                tick.value,
                epsilon = 1e-9
            );
            assert!(tick.position > 5.0 && tick.position < 26.0);
        }
    }

    #[test]
    fn test_degenerate_span_has_no_ticks() {
        assert!(axis_ticks(10.0, 10.0, Unit::MomentumTransfer, Unit::Angle, 0.4, 8).is_empty());
    }
}
