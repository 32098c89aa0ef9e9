//! The recalculation of a pattern's derived data from its original data and parameters.
//!
//! [`recalculate`] is a pure function: it reads the original data, the settings and the
//! derived data of the reference background and returns the new derived data together with
//! the side-products of the automatic background subtraction. Committing the result and
//! notifying subscribers is left to the engine, so a failed recalculation changes nothing.

use crate::background::BackgroundExtractor;
use crate::config::PatternSettings;
use crate::error::{PatternError, Result};
use crate::grid::{align, InterpolationKind};
use crate::math_tools::{gaussian_filter1d, subtract_in_place};
use crate::pattern::PatternData;

/// Output of one recalculation.
#[derive(Debug, Clone, PartialEq)]
pub struct Recalculated {
    pub derived: PatternData,
    pub auto_background_before_subtraction: Option<PatternData>,
    pub auto_background: Option<PatternData>,
    /// ROI after clamping to the data extent, `None` if no ROI is set.
    pub auto_background_roi: Option<[f64; 2]>,
}

/// Clamps `roi` to `[x_min, x_max]`, accepting the bounds in either order.
fn clamp_roi(roi: [f64; 2], x_min: f64, x_max: f64) -> [f64; 2] {
    let (low, high) = if roi[0] <= roi[1] {
        (roi[0], roi[1])
    } else {
        (roi[1], roi[0])
    };
    [low.max(x_min).min(x_max), high.min(x_max).max(x_min)]
}

/// Runs the processing chain for one pattern.
///
/// 1. `y = original_y · scale + offset`
/// 2. subtract the reference background, interpolated linearly onto the overlapping grid
/// 3. subtract the automatic background, extracted on the (clamped) ROI
/// 4. Gaussian smoothing with σ = `settings.smoothing` samples
///
/// # Errors
/// - [`PatternError::RangeOverlap`] when the reference does not overlap with the pattern or
///   the ROI contains no sample
/// - [`PatternError::Extraction`] when the extractor fails or returns a curve of the wrong length
pub fn recalculate(
    name: &str,
    original: &PatternData,
    settings: &PatternSettings,
    reference: Option<&PatternData>,
    extractor: &dyn BackgroundExtractor,
) -> Result<Recalculated> {
    let mut x = original.x.clone();
    let mut y = original.y.mapv(|v| v * settings.scale + settings.offset);

    if let Some(reference) = reference {
        let aligned = align(
            &x,
            &y,
            &reference.x,
            &reference.y,
            InterpolationKind::Linear,
            name,
        )?;
        x = aligned.x;
        y = aligned.y_a;
        subtract_in_place(&mut y, &aligned.y_b);
    }

    let mut auto_background_before_subtraction = None;
    let mut auto_background = None;
    let mut auto_background_roi = settings.auto_background.roi;

    if settings.auto_background.enabled {
        let before = PatternData {
            x: x.clone(),
            y: y.clone(),
        };

        if let Some(roi) = settings.auto_background.roi {
            let (low, high) = (roi[0].min(roi[1]), roi[0].max(roi[1]));
            let clipped = before.select(|v| v >= low && v <= high);
            let (x_min, x_max) = match before.x_extent() {
                Some(extent) if !clipped.is_empty() => extent,
                _ => return Err(PatternError::range_overlap(name)),
            };
            let clamped = clamp_roi(roi, x_min, x_max);
            if clamped != roi {
                log::warn!("auto background ROI {roi:?} of {name} clamped to {clamped:?}");
            }
            x = clipped.x;
            y = clipped.y;
            auto_background_roi = Some(clamped);
        }

        let y_bkg = extractor.extract(&x, &y, settings.auto_background.parameters)?;
        if y_bkg.len() != y.len() {
            return Err(PatternError::Extraction(format!(
                "{} returned {} background values for {} samples",
                extractor.name(),
                y_bkg.len(),
                y.len()
            )));
        }
        subtract_in_place(&mut y, &y_bkg);

        auto_background_before_subtraction = Some(before);
        auto_background = Some(PatternData {
            x: x.clone(),
            y: y_bkg,
        });
    }

    if settings.smoothing > 0.0 {
        y = gaussian_filter1d(&y, settings.smoothing);
    }

    Ok(Recalculated {
        derived: PatternData { x, y },
        auto_background_before_subtraction,
        auto_background,
        auto_background_roi,
    })
}
