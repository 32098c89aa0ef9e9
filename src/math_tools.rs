//! Numerical helpers shared by the processing pipeline: Gaussian smoothing with
//! mirror-reflected boundaries, and a least-squares Chebyshev polynomial fit used by the
//! default background extractor.

use ndarray::{Array1, Array2, ArrayView1, Zip};

/// Number of standard deviations after which the Gaussian kernel is cut off.
const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// Maps an index that may fall outside `[0, len)` back into it by mirroring at the edges.
///
/// The edge sample is repeated (`... 1 0 | 0 1 2 ... n-1 | n-1 n-2 ...`).
fn reflect_index(idx: isize, len: usize) -> usize {
    let len_i = len as isize;
    let x = idx.rem_euclid(2 * len_i);
    if x >= len_i {
        (2 * len_i - 1 - x) as usize
    } else {
        x as usize
    }
}

/// Builds a normalised Gaussian kernel with radius `round(4 σ)`, at most `max_radius`.
fn gaussian_kernel(sigma: f64, max_radius: usize) -> Array1<f64> {
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5).min(max_radius as f64) as isize;
    let two_sigma2 = 2.0 * sigma * sigma;
    let kernel = Array1::from_iter((-radius..=radius).map(|dx| {
        let x = dx as f64;
        (-x * x / two_sigma2).exp()
    }));
    let sum = kernel.sum();
    kernel / sum
}

/// Smooths `y` with a Gaussian of standard deviation `sigma`, measured in samples.
///
/// Samples beyond the ends are mirrored, so a constant signal stays constant.
/// A non-positive or non-finite `sigma` returns the input unchanged. The kernel radius is
/// capped at the signal length, beyond which reflection only repeats samples.
pub fn gaussian_filter1d(y: &Array1<f64>, sigma: f64) -> Array1<f64> {
    if !sigma.is_finite() || sigma <= 0.0 || y.is_empty() {
        return y.clone();
    }
    let kernel = gaussian_kernel(sigma, y.len());
    let radius = (kernel.len() / 2) as isize;
    let n = y.len();

    Array1::from_iter((0..n as isize).map(|i| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * y[reflect_index(i + k as isize - radius, n)])
            .sum::<f64>()
    }))
}

/// Maps `x` linearly onto `[-1, 1]`, the natural domain of Chebyshev polynomials.
pub fn chebyshev_domain(x: ArrayView1<f64>) -> Array1<f64> {
    let n = x.len();
    if n < 2 || x[n - 1] == x[0] {
        return Array1::zeros(n);
    }
    let (first, last) = (x[0], x[n - 1]);
    x.mapv(|xi| 2.0 * (xi - first) / (last - first) - 1.0)
}

/// Evaluates `T_0 .. T_order` at every point of `t` (one row per point).
fn chebyshev_vandermonde(t: &Array1<f64>, order: usize) -> Array2<f64> {
    let mut v = Array2::<f64>::zeros((t.len(), order + 1));
    for (i, &ti) in t.iter().enumerate() {
        v[[i, 0]] = 1.0;
        if order >= 1 {
            v[[i, 1]] = ti;
        }
        for k in 2..=order {
            v[[i, k]] = 2.0 * ti * v[[i, k - 1]] - v[[i, k - 2]];
        }
    }
    v
}

/// Least-squares solution of `a · c = b` via Householder QR.
///
/// `a` must have at least as many rows as columns. Columns that turn out numerically
/// dependent get a zero coefficient.
fn least_squares(mut a: Array2<f64>, mut b: Array1<f64>) -> Array1<f64> {
    let (rows, cols) = a.dim();
    for k in 0..cols {
        let norm = a.column(k).iter().skip(k).map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            continue;
        }
        let alpha = if a[[k, k]] > 0.0 { -norm } else { norm };
        let mut v = Array1::<f64>::zeros(rows);
        for i in k..rows {
            v[i] = a[[i, k]];
        }
        v[k] -= alpha;
        let v_norm2 = v.iter().skip(k).map(|x| x * x).sum::<f64>();
        if v_norm2 == 0.0 {
            continue;
        }
        for j in k..cols {
            let dot = (k..rows).map(|i| v[i] * a[[i, j]]).sum::<f64>();
            let f = 2.0 * dot / v_norm2;
            for i in k..rows {
                a[[i, j]] -= f * v[i];
            }
        }
        let dot = (k..rows).map(|i| v[i] * b[i]).sum::<f64>();
        let f = 2.0 * dot / v_norm2;
        for i in k..rows {
            b[i] -= f * v[i];
        }
    }

    // back substitution on the upper triangle
    let mut c = Array1::<f64>::zeros(cols);
    for k in (0..cols).rev() {
        let diag = a[[k, k]];
        if diag.abs() < f64::EPSILON * 1e3 {
            continue;
        }
        let s = ((k + 1)..cols).map(|j| a[[k, j]] * c[j]).sum::<f64>();
        c[k] = (b[k] - s) / diag;
    }
    c
}

/// Fits a Chebyshev series of degree `order` to `(t, y)` with `t` in `[-1, 1]` and returns
/// the fitted values at `t`.
///
/// The degree is lowered to `len - 1` when there are fewer samples than coefficients.
pub fn chebyshev_fit(t: &Array1<f64>, y: &Array1<f64>, order: usize) -> Array1<f64> {
    if t.is_empty() {
        return Array1::zeros(0);
    }
    let order = order.min(t.len() - 1);
    let vandermonde = chebyshev_vandermonde(t, order);
    let coefficients = least_squares(vandermonde.clone(), y.clone());
    vandermonde.dot(&coefficients)
}

/// Subtracts `background` from `signal` in place.
pub fn subtract_in_place(signal: &mut Array1<f64>, background: &Array1<f64>) {
    Zip::from(signal).and(background).for_each(|s, b| {
        *s -= b;
    });
}
