//! Default background extractor.
//!
//! The signal is padded at both ends, clipped from above, and then repeatedly replaced by the
//! running window average wherever it lies above that average. This strips the peaks and
//! leaves the slowly varying background, which is finally smoothed by a least-squares
//! Chebyshev polynomial fit.
//!
//! Parameters: `[smooth_width, iterations, chebyshev_order]`, where `smooth_width` is the
//! half width of the averaging window in x units.

use crate::background::extractor::BackgroundExtractor;
use crate::error::{PatternError, Result};
use crate::math_tools::{chebyshev_domain, chebyshev_fit};
use extractor_macros::register_extractor;
use ndarray::{s, Array1};

#[register_extractor]
#[derive(Clone, Debug, Default)]
pub struct BrucknerChebyshev;

/// Iteratively replaces values above the window average by that average.
///
/// `half_width` is the half width of the window in samples.
fn smooth_bruckner(y: &Array1<f64>, half_width: usize, iterations: usize) -> Array1<f64> {
    let n_data = y.len();
    let n = half_width;
    let mut padded = Array1::<f64>::zeros(n_data + 2 * n);
    padded.slice_mut(s![..n]).fill(y[0]);
    padded.slice_mut(s![n..n + n_data]).assign(y);
    padded.slice_mut(s![n + n_data..]).fill(y[n_data - 1]);

    let avg = padded.mean().unwrap_or(0.0);
    let min = padded.iter().copied().fold(f64::INFINITY, f64::min);
    let cutoff = avg + 2.0 * (avg - min);
    padded.mapv_inplace(|v| v.min(cutoff));

    let window_size = (2 * n + 1) as f64;
    let len = padded.len();
    for _ in 0..iterations {
        let mut window_avg = padded.slice(s![..2 * n + 1]).sum() / window_size;
        for i in n..n + n_data {
            if padded[i] > window_avg {
                padded[i] = window_avg;
            }
            if i + n + 1 < len {
                window_avg += (padded[i + n + 1] - padded[i - n]) / window_size;
            }
        }
    }
    padded.slice(s![n..n + n_data]).to_owned()
}

impl BackgroundExtractor for BrucknerChebyshev {
    fn new() -> Self {
        BrucknerChebyshev
    }

    fn name(&self) -> &'static str {
        "Bruckner + Chebyshev"
    }

    fn extract(
        &self,
        x: &Array1<f64>,
        y: &Array1<f64>,
        parameters: [f64; 3],
    ) -> Result<Array1<f64>> {
        if x.len() != y.len() {
            return Err(PatternError::Extraction(format!(
                "x has {} samples but y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Ok(y.clone());
        }
        let [smooth_width, iterations, order] = parameters;
        if !(smooth_width.is_finite() && iterations >= 0.0 && order >= 0.0) {
            return Err(PatternError::Extraction(format!(
                "invalid parameters {parameters:?}"
            )));
        }

        let step = x[1] - x[0];
        let half_width = if step == 0.0 {
            0
        } else {
            (smooth_width / step).abs() as usize
        };
        // a window wider than the data degenerates to the global average
        let half_width = half_width.min(x.len());

        let stripped = smooth_bruckner(y, half_width, iterations as usize);
        let t = chebyshev_domain(x.view());
        Ok(chebyshev_fit(&t, &stripped, order as usize))
    }
}
