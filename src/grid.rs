//! Alignment of two sampled curves whose x grids may differ.
//!
//! [`align`] is the single place where grid mismatches are resolved: the second curve is
//! interpolated onto the part of the first grid that lies inside its own domain. The first
//! curve is never resampled and nothing is extrapolated.

use crate::error::{PatternError, Result};
use interp1d::Interp1d;
use ndarray::Array1;

/// Interpolation used to evaluate the second curve on the first grid.
///
/// Reference-background subtraction uses [`InterpolationKind::Linear`]; pattern algebra
/// uses [`InterpolationKind::Cubic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationKind {
    Linear,
    Cubic,
}

/// Cubic spline through a set of knots, stored as per-segment polynomial coefficients.
///
/// On segment `i` the spline is `a_i + b_i·dx + c_i·dx² + d_i·dx³` with `dx = x - knots[i]`.
/// End conditions are not-a-knot (the third derivative is continuous across the second and
/// the second-to-last knot), so four or more knots lying on one cubic are reproduced exactly.
#[derive(Default, PartialEq, Debug, Clone)]
pub struct CubicSpline {
    pub knots: Array1<f64>,
    pub coeff_a: Array1<f64>,
    pub coeff_b: Array1<f64>,
    pub coeff_c: Array1<f64>,
    pub coeff_d: Array1<f64>,
}

impl CubicSpline {
    /// Builds the spline through `(x, y)`. `x` may be ascending or descending.
    ///
    /// Three knots give the interpolating parabola and two knots a straight line.
    pub fn new(x: &Array1<f64>, y: &Array1<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(PatternError::Interpolation(format!(
                "x has {} samples but y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(PatternError::Interpolation(
                "a cubic spline needs at least two knots".to_string(),
            ));
        }

        let (x, y) = if x[0] > x[x.len() - 1] {
            (
                x.iter().rev().copied().collect::<Array1<f64>>(),
                y.iter().rev().copied().collect::<Array1<f64>>(),
            )
        } else {
            (x.clone(), y.clone())
        };

        let n = x.len();
        let h: Array1<f64> = Array1::from_iter((0..n - 1).map(|i| x[i + 1] - x[i]));
        if h.iter().any(|hi| *hi <= 0.0) {
            return Err(PatternError::Interpolation(
                "knots must be strictly monotonic".to_string(),
            ));
        }
        let slope: Array1<f64> = Array1::from_iter((0..n - 1).map(|i| (y[i + 1] - y[i]) / h[i]));
        let m = second_derivatives(&h, &slope);

        let segments = n - 1;
        let mut spline = CubicSpline {
            coeff_a: Array1::zeros(segments),
            coeff_b: Array1::zeros(segments),
            coeff_c: Array1::zeros(segments),
            coeff_d: Array1::zeros(segments),
            knots: x,
        };
        for i in 0..segments {
            spline.coeff_a[i] = y[i];
            spline.coeff_b[i] = slope[i] - h[i] * (2.0 * m[i] + m[i + 1]) / 6.0;
            spline.coeff_c[i] = m[i] / 2.0;
            spline.coeff_d[i] = (m[i + 1] - m[i]) / (6.0 * h[i]);
        }
        Ok(spline)
    }

    /// Evaluates the spline at `x`. Points outside the knots continue the end segments.
    pub fn eval_single(&self, x: f64) -> f64 {
        let n = self.knots.len();

        // binary search for the segment
        let mut left = 0;
        let mut right = n - 1;
        while right - left > 1 {
            let mid = (left + right) / 2;
            if self.knots[mid] > x {
                right = mid;
            } else {
                left = mid;
            }
        }

        let dx = x - self.knots[left];
        self.coeff_a[left]
            + self.coeff_b[left] * dx
            + self.coeff_c[left] * dx * dx
            + self.coeff_d[left] * dx * dx * dx
    }
}

/// Second derivatives of the not-a-knot spline at every knot.
///
/// `h` holds the knot spacings and `slope` the secant slopes of each segment.
fn second_derivatives(h: &Array1<f64>, slope: &Array1<f64>) -> Array1<f64> {
    let n = h.len() + 1;
    match n {
        2 => return Array1::zeros(2),
        3 => {
            // single parabola: constant curvature
            let curvature = 2.0 * (slope[1] - slope[0]) / (h[0] + h[1]);
            return Array1::from_elem(3, curvature);
        }
        _ => {}
    }

    // unknowns m[1] ..= m[n-2]; m[0] and m[n-1] are eliminated with the not-a-knot rows
    let size = n - 2;
    let mut lower = Array1::<f64>::zeros(size);
    let mut diag = Array1::<f64>::zeros(size);
    let mut upper = Array1::<f64>::zeros(size);
    let mut rhs = Array1::<f64>::zeros(size);
    for r in 0..size {
        let i = r + 1;
        lower[r] = h[i - 1];
        diag[r] = 2.0 * (h[i - 1] + h[i]);
        upper[r] = h[i];
        rhs[r] = 6.0 * (slope[i] - slope[i - 1]);
    }

    let (h0, h1) = (h[0], h[1]);
    diag[0] += h0 * (h0 + h1) / h1;
    upper[0] -= h0 * h0 / h1;

    let (hp, hl) = (h[n - 3], h[n - 2]);
    diag[size - 1] += hl * (hp + hl) / hp;
    lower[size - 1] -= hl * hl / hp;

    let inner = solve_tridiagonal(&lower, &diag, &upper, &rhs);

    let mut m = Array1::<f64>::zeros(n);
    for r in 0..size {
        m[r + 1] = inner[r];
    }
    m[0] = ((h0 + h1) * m[1] - h0 * m[2]) / h1;
    m[n - 1] = ((hp + hl) * m[n - 2] - hl * m[n - 3]) / hp;
    m
}

/// Thomas algorithm for a tridiagonal system. `lower[0]` and `upper[last]` are ignored.
fn solve_tridiagonal(
    lower: &Array1<f64>,
    diag: &Array1<f64>,
    upper: &Array1<f64>,
    rhs: &Array1<f64>,
) -> Array1<f64> {
    let n = diag.len();
    let mut c = Array1::<f64>::zeros(n);
    let mut d = Array1::<f64>::zeros(n);
    c[0] = upper[0] / diag[0];
    d[0] = rhs[0] / diag[0];
    for i in 1..n {
        let denom = diag[i] - lower[i] * c[i - 1];
        c[i] = upper[i] / denom;
        d[i] = (rhs[i] - lower[i] * d[i - 1]) / denom;
    }
    let mut out = Array1::<f64>::zeros(n);
    out[n - 1] = d[n - 1];
    for i in (0..n - 1).rev() {
        out[i] = d[i] - c[i] * out[i + 1];
    }
    out
}

/// Evaluates `(x_known, y_known)` at every point of `x_new` with the given interpolation.
///
/// All points of `x_new` are expected to lie inside the known domain.
pub fn interpolate(
    x_known: &Array1<f64>,
    y_known: &Array1<f64>,
    x_new: &Array1<f64>,
    kind: InterpolationKind,
) -> Result<Array1<f64>> {
    match kind {
        InterpolationKind::Linear => {
            if x_known.len() == 1 {
                // a single knot can only be hit exactly
                return Ok(Array1::from_elem(x_new.len(), y_known[0]));
            }
            let interpolator = Interp1d::new_unsorted(x_known.to_vec(), y_known.to_vec())
                .map_err(|err| PatternError::Interpolation(format!("{err:?}")))?;
            Ok(x_new.mapv(|x| interpolator.interpolate(x)))
        }
        InterpolationKind::Cubic => {
            let spline = CubicSpline::new(x_known, y_known)?;
            Ok(x_new.mapv(|x| spline.eval_single(x)))
        }
    }
}

/// Two curves on a common grid, as returned by [`align`].
#[derive(Debug, Clone, PartialEq)]
pub struct Aligned {
    pub x: Array1<f64>,
    pub y_a: Array1<f64>,
    pub y_b: Array1<f64>,
}

/// Brings `(x_b, y_b)` onto the grid of `(x_a, y_a)`.
///
/// 1. Identical grids are returned unchanged, no interpolation is performed.
/// 2. Otherwise `x_a` is restricted to the closed interval `[min(x_b), max(x_b)]` and
///    `(x_b, y_b)` is interpolated onto the remaining points with `kind`.
///
/// # Errors
/// [`PatternError::RangeOverlap`] carrying `name` when no point of `x_a` lies inside the
/// domain of `x_b`.
pub fn align(
    x_a: &Array1<f64>,
    y_a: &Array1<f64>,
    x_b: &Array1<f64>,
    y_b: &Array1<f64>,
    kind: InterpolationKind,
    name: &str,
) -> Result<Aligned> {
    if x_a == x_b {
        return Ok(Aligned {
            x: x_a.clone(),
            y_a: y_a.clone(),
            y_b: y_b.clone(),
        });
    }

    if x_b.is_empty() {
        return Err(PatternError::range_overlap(name));
    }
    let b_min = x_b.iter().copied().fold(f64::INFINITY, f64::min);
    let b_max = x_b.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let inside: Vec<usize> = x_a
        .iter()
        .enumerate()
        .filter(|(_, x)| **x >= b_min && **x <= b_max)
        .map(|(i, _)| i)
        .collect();
    if inside.is_empty() {
        return Err(PatternError::range_overlap(name));
    }

    let x: Array1<f64> = inside.iter().map(|&i| x_a[i]).collect();
    let y_a: Array1<f64> = inside.iter().map(|&i| y_a[i]).collect();
    let y_b = interpolate(x_b, y_b, &x, kind)?;
    log::debug!(
        "aligned {name}: {} of {} samples inside [{b_min}, {b_max}]",
        x.len(),
        x_a.len()
    );
    Ok(Aligned { x, y_a, y_b })
}
